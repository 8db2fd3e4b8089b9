use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::carriers::{CarrierGateway, FulfillmentStep};
use crate::clock::Clock;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{fulfillment_failure, order, shipment, ShipmentStatus};

/// Service for managing shipment records: creation from paid orders,
/// cancellation, manual posting, and operator queries.
///
/// Pre-dispatch fields are otherwise owned by the label workflow and
/// post-dispatch status by the tracking service; this service only touches
/// the edges explicitly allowed to operators.
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn CarrierGateway>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
}

impl ShipmentService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn CarrierGateway>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            event_sender,
            clock,
        }
    }

    /// Creates the shipment record for a confirmed-paid order, snapshotting
    /// recipient and shipping selection. One shipment per order.
    #[instrument(skip(self))]
    pub async fn create_from_order(
        &self,
        order_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;

        let order = order::Model::find_by_id(db, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !order.is_paid() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is not paid (payment status: {})",
                order_id, order.payment_status
            )));
        }

        if let Some(existing) = shipment::Model::find_by_order_id(db, order_id)
            .await?
            .into_iter()
            .next()
        {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} already has shipment {}",
                order_id, existing.id
            )));
        }

        let model = shipment::Model::from_order(&order, self.clock.now());
        let active: shipment::ActiveModel = model.clone().into();
        let saved = active.insert(db).await?;

        info!(shipment_id = %saved.id, %order_id, "Shipment created");
        let _ = self
            .event_sender
            .send(Event::ShipmentCreated {
                shipment_id: saved.id,
                order_id,
            })
            .await;

        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn get_shipment(
        &self,
        shipment_id: Uuid,
    ) -> Result<Option<shipment::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(shipment::Entity::find_by_id(shipment_id).one(db).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_shipments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<shipment::Model>, ServiceError> {
        let db = &*self.db_pool;
        Ok(shipment::Model::find_by_order_id(db, order_id).await?)
    }

    /// Lists shipments with pagination and optional status/order filters
    #[instrument(skip(self))]
    pub async fn list_shipments(
        &self,
        page: u64,
        limit: u64,
        status: Option<String>,
        order_id: Option<Uuid>,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = shipment::Entity::find();

        if let Some(status_filter) = status {
            match status_filter.parse::<ShipmentStatus>() {
                Ok(parsed) => query = query.filter(shipment::Column::Status.eq(parsed)),
                Err(_) => {
                    return Err(ServiceError::BadRequest(format!(
                        "Unknown shipment status '{}'",
                        status_filter
                    )))
                }
            }
        }

        if let Some(order_id) = order_id {
            query = query.filter(shipment::Column::OrderId.eq(order_id));
        }

        let paginator = query
            .order_by_desc(shipment::Column::CreatedAt)
            .paginate(db, limit.max(1));

        let total = paginator.num_items().await?;
        let shipments = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((shipments, total))
    }

    /// Cancels a shipment, synchronously against the carrier.
    ///
    /// Only valid while no label exists; a shipment that is `generated` or
    /// later is rejected without any state change.
    #[instrument(skip(self))]
    pub async fn cancel_shipment(
        &self,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;

        let mut model = shipment::Model::find_by_id(db, shipment_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipment {} not found", shipment_id))
            })?;

        if !model.can_cancel() {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot cancel shipment {} in status {}",
                shipment_id, model.status
            )));
        }

        // Nothing to undo remotely before checkout assigned an id
        if let Some(carrier_shipment_id) = model.carrier_shipment_id.clone() {
            let cancelled = self
                .gateway
                .cancel_shipment(&carrier_shipment_id)
                .await
                .map_err(|e| ServiceError::FulfillmentFailed {
                    step: FulfillmentStep::Cancel,
                    message: e.to_string(),
                    retryable: e.is_transient(),
                })?;
            if !cancelled {
                warn!(%shipment_id, %carrier_shipment_id, "Carrier reported nothing to cancel");
            }
        }

        let now = self.clock.now();
        model.transition_to(ShipmentStatus::Cancelled, now)?;

        let mut active: shipment::ActiveModel = model.clone().into();
        active.status = Set(model.status);
        active.cancelled_at = Set(model.cancelled_at);
        active.updated_at = Set(now);
        let updated = active.update(db).await?;

        let _ = self
            .event_sender
            .send(Event::ShipmentCancelled { shipment_id })
            .await;

        Ok(updated)
    }

    /// Operator action: record that the package was physically handed to
    /// the carrier. Valid only for a `generated` shipment.
    #[instrument(skip(self))]
    pub async fn mark_posted(&self, shipment_id: Uuid) -> Result<shipment::Model, ServiceError> {
        let db = &*self.db_pool;

        let mut model = shipment::Model::find_by_id(db, shipment_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shipment {} not found", shipment_id))
            })?;

        if model.status != ShipmentStatus::Generated {
            return Err(ServiceError::InvalidOperation(format!(
                "Cannot mark shipment {} as posted from status {}",
                shipment_id, model.status
            )));
        }

        let old_status = model.status;
        let now = self.clock.now();
        model.transition_to(ShipmentStatus::Posted, now)?;

        let mut active: shipment::ActiveModel = model.clone().into();
        active.status = Set(model.status);
        active.posted_at = Set(model.posted_at);
        active.updated_at = Set(now);
        let updated = active.update(db).await?;

        let _ = self
            .event_sender
            .send(Event::ShipmentStatusChanged {
                shipment_id,
                old_status,
                new_status: ShipmentStatus::Posted,
            })
            .await;

        Ok(updated)
    }

    /// Operator view of permanently failed fulfillment tasks
    #[instrument(skip(self))]
    pub async fn list_failures(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<fulfillment_failure::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = fulfillment_failure::Entity::find()
            .order_by_desc(fulfillment_failure::Column::FailedAt)
            .paginate(db, limit.max(1));

        let total = paginator.num_items().await?;
        let failures = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((failures, total))
    }
}
