use std::sync::Arc;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::carriers::{CarrierError, CarrierGateway, CartRequest, FulfillmentStep};
use crate::clock::Clock;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::message_queue::{FulfillmentTask, RetryPolicy, TaskQueue};
use crate::models::{shipment, ShipmentStatus};
use crate::services::notifications::NotificationDispatcher;

/// Drives the resumable label generation workflow and its batch fan-out.
///
/// Each step persists the carrier-assigned identifier before advancing
/// status, so a retried invocation resumes at the first incomplete step
/// instead of repeating work already done against the carrier. The window
/// between a successful gateway call and the persist is the one place a
/// crash can cause a duplicate remote call; the gateway contract does not
/// promise idempotency, and this is accepted.
#[derive(Clone)]
pub struct LabelService {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn CarrierGateway>,
    queue: Arc<dyn TaskQueue>,
    notifier: Arc<dyn NotificationDispatcher>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl LabelService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn CarrierGateway>,
        queue: Arc<dyn TaskQueue>,
        notifier: Arc<dyn NotificationDispatcher>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            queue,
            notifier,
            event_sender,
            clock,
            retry_policy,
        }
    }

    fn step_error(step: FulfillmentStep, err: CarrierError) -> ServiceError {
        ServiceError::FulfillmentFailed {
            step,
            message: err.to_string(),
            retryable: err.is_transient(),
        }
    }

    /// Takes one shipment from wherever it currently stands to `generated`.
    ///
    /// Safe to invoke repeatedly: steps already recorded as complete are
    /// skipped. The workflow itself never retries a failed gateway call;
    /// that belongs to the queue layer that invoked it.
    #[instrument(skip(self))]
    pub async fn generate_label(
        &self,
        shipment_id: Uuid,
        notify: bool,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;

        let mut current = shipment::Model::find_by_id(db, shipment_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipment {} not found", shipment_id))
            })?;

        if !current.can_generate_label() {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot generate label for shipment {} in status {}",
                shipment_id, current.status
            )));
        }

        if current.status == ShipmentStatus::Pending {
            let request = CartRequest::from(&current);
            let cart_reference = self
                .gateway
                .add_to_cart(&request)
                .await
                .map_err(|e| Self::step_error(FulfillmentStep::AddToCart, e))?;

            let now = self.clock.now();
            current.cart_reference = Some(cart_reference.clone());
            current.transition_to(ShipmentStatus::CartAdded, now)?;

            let mut active: shipment::ActiveModel = current.clone().into();
            active.cart_reference = Set(Some(cart_reference));
            active.status = Set(ShipmentStatus::CartAdded);
            active.updated_at = Set(now);
            current = active.update(db).await?;
            debug!(%shipment_id, "Added to carrier cart");
        }

        if current.status == ShipmentStatus::CartAdded {
            let cart_reference = current.cart_reference.clone().ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Shipment {} is cart_added without a cart reference",
                    shipment_id
                ))
            })?;

            let carrier_shipment_id = self
                .gateway
                .checkout(&cart_reference)
                .await
                .map_err(|e| Self::step_error(FulfillmentStep::Checkout, e))?;

            let now = self.clock.now();
            current.carrier_shipment_id = Some(carrier_shipment_id.clone());
            current.transition_to(ShipmentStatus::Purchased, now)?;

            let mut active: shipment::ActiveModel = current.clone().into();
            active.carrier_shipment_id = Set(Some(carrier_shipment_id));
            active.status = Set(ShipmentStatus::Purchased);
            active.updated_at = Set(now);
            current = active.update(db).await?;
            debug!(%shipment_id, "Carrier checkout complete");
        }

        if current.status == ShipmentStatus::Purchased {
            let carrier_shipment_id = current.carrier_shipment_id.clone().ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Shipment {} is purchased without a carrier shipment id",
                    shipment_id
                ))
            })?;

            let label = self
                .gateway
                .generate_label(&carrier_shipment_id)
                .await
                .map_err(|e| Self::step_error(FulfillmentStep::GenerateLabel, e))?;

            let now = self.clock.now();
            current.label_url = Some(label.label_url.clone());
            current.tracking_number = Some(label.tracking_number.clone());
            current.transition_to(ShipmentStatus::Generated, now)?;

            let mut active: shipment::ActiveModel = current.clone().into();
            active.label_url = Set(Some(label.label_url));
            active.tracking_number = Set(Some(label.tracking_number.clone()));
            active.status = Set(ShipmentStatus::Generated);
            active.label_generated_at = Set(current.label_generated_at);
            active.updated_at = Set(now);
            current = active.update(db).await?;

            info!(%shipment_id, tracking_number = %label.tracking_number, "Label generated");

            // Exactly-once handoff: only the invocation that performed the
            // generated transition notifies. Missing email is a no-op.
            if notify && current.recipient_email.is_some() {
                self.notifier.label_generated(&current).await;
            }

            let _ = self
                .event_sender
                .send(Event::LabelGenerated {
                    shipment_id,
                    tracking_number: label.tracking_number,
                })
                .await;
        }

        Ok(current)
    }

    /// Validates and enqueues a single label generation run
    #[instrument(skip(self))]
    pub async fn enqueue_generate(
        &self,
        shipment_id: Uuid,
        notify: bool,
    ) -> Result<Uuid, ServiceError> {
        let db = &*self.db_pool;
        let model = shipment::Model::find_by_id(db, shipment_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipment {} not found", shipment_id))
            })?;

        if !model.can_generate_label() {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot generate label for shipment {} in status {}",
                shipment_id, model.status
            )));
        }

        self.queue
            .enqueue(
                FulfillmentTask::GenerateLabel {
                    shipment_id,
                    notify,
                },
                self.retry_policy,
            )
            .await
            .map_err(|e| ServiceError::QueueError(e.to_string()))
    }

    /// Batch fan-out: schedules one independent workflow execution per
    /// shipment that can still take a label, silently dropping the rest.
    /// Returns only the number scheduled; per-shipment outcomes surface
    /// later through shipment status and the failure records.
    #[instrument(skip(self))]
    pub async fn dispatch_batch(
        &self,
        shipment_ids: &[Uuid],
        notify: bool,
    ) -> Result<usize, ServiceError> {
        if shipment_ids.is_empty() {
            return Ok(0);
        }

        let db = &*self.db_pool;
        let shipments = shipment::Entity::find()
            .filter(shipment::Column::Id.is_in(shipment_ids.iter().copied()))
            .all(db)
            .await?;

        let mut scheduled = 0usize;
        for model in shipments {
            if !model.can_generate_label() {
                debug!(shipment_id = %model.id, status = %model.status, "Skipping shipment in batch");
                continue;
            }
            self.queue
                .enqueue(
                    FulfillmentTask::GenerateLabel {
                        shipment_id: model.id,
                        notify,
                    },
                    self.retry_policy,
                )
                .await
                .map_err(|e| ServiceError::QueueError(e.to_string()))?;
            scheduled += 1;
        }

        info!(requested = shipment_ids.len(), scheduled, "Batch label dispatch");
        Ok(scheduled)
    }
}
