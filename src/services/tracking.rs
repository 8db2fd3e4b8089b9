use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::carriers::{CarrierGateway, CarrierTrackingEvent};
use crate::clock::Clock;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::shipment_event::{self, dedup_key, TrackingStatus};
use crate::models::{shipment, ShipmentStatus};

/// Result of one ingestion call
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Events that did not exist before this call
    pub new_events: Vec<shipment_event::Model>,
    /// `(old, new)` when the shipment's status was advanced
    pub status_change: Option<(ShipmentStatus, ShipmentStatus)>,
}

/// Sole writer of post-dispatch shipment state.
///
/// Both entry points (the scheduled poll and the webhook worker) funnel
/// into [`TrackingService::ingest`], which deduplicates events against the
/// shipment's append-only log and adopts the carrier's coarse status under
/// a monotonic conditional write. Polls and webhooks may race; the
/// conditional write makes the outcome convergent without locks.
#[derive(Clone)]
pub struct TrackingService {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn CarrierGateway>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
}

impl TrackingService {
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

    /// Converts a carrier tracking payload into new event rows and a
    /// possibly-updated shipment status.
    ///
    /// Never creates duplicate events and never regresses status. A
    /// non-trackable shipment (not yet dispatched, or cancelled) is a
    /// logged no-op, not an error: webhooks replay and carriers misfire.
    #[instrument(skip(self, shipment, events), fields(shipment_id = %shipment.id))]
    pub async fn ingest(
        &self,
        shipment: &shipment::Model,
        carrier_status: TrackingStatus,
        events: &[CarrierTrackingEvent],
    ) -> Result<IngestOutcome, ServiceError> {
        if !shipment.is_trackable() {
            debug!(status = %shipment.status, "Ignoring tracking data for non-trackable shipment");
            return Ok(IngestOutcome::default());
        }

        let db = &*self.db_pool;
        let mut outcome = IngestOutcome::default();

        // Existing dedup keys for this shipment; also guards against
        // duplicates inside the incoming batch itself.
        let mut seen: HashSet<(String, DateTime<Utc>)> = shipment_event::Entity::find()
            .filter(shipment_event::Column::ShipmentId.eq(shipment.id))
            .all(db)
            .await?
            .into_iter()
            .map(|event| (event.event_key.clone(), event.event_at))
            .collect();

        for event in events {
            let key = dedup_key(event.code.as_deref(), &event.description);
            if key.is_empty() {
                warn!("Dropping carrier event with neither code nor description");
                continue;
            }
            if !seen.insert((key.clone(), event.event_at)) {
                continue;
            }

            let model = shipment_event::Model {
                id: Uuid::new_v4(),
                shipment_id: shipment.id,
                code: event.code.clone(),
                description: event.description.clone(),
                event_key: key,
                status: event.status,
                city: event.city.clone(),
                state: event.state.clone(),
                country: event.country.clone(),
                event_at: event.event_at,
                created_at: self.clock.now(),
            };

            let active = shipment_event::ActiveModel {
                id: Set(model.id),
                shipment_id: Set(model.shipment_id),
                code: Set(model.code.clone()),
                description: Set(model.description.clone()),
                event_key: Set(model.event_key.clone()),
                status: Set(model.status),
                city: Set(model.city.clone()),
                state: Set(model.state.clone()),
                country: Set(model.country.clone()),
                event_at: Set(model.event_at),
                created_at: Set(model.created_at),
            };

            // The unique index is the real idempotency guard; a racing
            // writer inserting the same key is silently absorbed.
            let inserted = shipment_event::Entity::insert(active)
                .on_conflict(
                    OnConflict::columns([
                        shipment_event::Column::ShipmentId,
                        shipment_event::Column::EventKey,
                        shipment_event::Column::EventAt,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(db)
                .await?;

            if inserted > 0 {
                outcome.new_events.push(model);
            }
        }

        outcome.status_change = self.adopt_status(shipment, carrier_status).await?;

        Ok(outcome)
    }

    /// Adopts the carrier's reported coarse status if it is strictly later
    /// in the canonical ordering than what the shipment currently shows.
    ///
    /// The write is conditional on the previously read status, so when a
    /// poll and a webhook race the stale writer simply no-ops.
    async fn adopt_status(
        &self,
        shipment: &shipment::Model,
        carrier_status: TrackingStatus,
    ) -> Result<Option<(ShipmentStatus, ShipmentStatus)>, ServiceError> {
        let Some(target) = ShipmentStatus::from_tracking(carrier_status) else {
            // `exception` lives in event history only
            return Ok(None);
        };

        let old = shipment.status;
        if old == target || !old.can_transition_to(target) {
            debug!(current = %old, reported = %target, "Status not adopted");
            return Ok(None);
        }

        let db = &*self.db_pool;
        let now = self.clock.now();

        let mut update = shipment::Entity::update_many()
            .col_expr(shipment::Column::Status, Expr::value(target))
            .col_expr(shipment::Column::UpdatedAt, Expr::value(now));

        // Milestone timestamp only for the status actually adopted
        update = match target {
            ShipmentStatus::Posted => {
                update.col_expr(shipment::Column::PostedAt, Expr::value(Some(now)))
            }
            ShipmentStatus::Delivered => {
                update.col_expr(shipment::Column::DeliveredAt, Expr::value(Some(now)))
            }
            _ => update,
        };

        let result = update
            .filter(shipment::Column::Id.eq(shipment.id))
            .filter(shipment::Column::Status.eq(old))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            debug!(shipment_id = %shipment.id, "Concurrent writer advanced status first");
            return Ok(None);
        }

        info!(shipment_id = %shipment.id, from = %old, to = %target, "Shipment status advanced");
        let _ = self
            .event_sender
            .send(Event::ShipmentStatusChanged {
                shipment_id: shipment.id,
                old_status: old,
                new_status: target,
            })
            .await;

        Ok(Some((old, target)))
    }

    /// Scheduled poll sweep: asks the carrier about every trackable,
    /// non-terminal shipment with a known carrier shipment id. One
    /// shipment's gateway failure never aborts the sweep.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Result<u64, ServiceError> {
        let db = &*self.db_pool;

        let candidates = shipment::Entity::find()
            .filter(shipment::Column::Status.is_in([
                ShipmentStatus::Generated,
                ShipmentStatus::Posted,
                ShipmentStatus::InTransit,
                ShipmentStatus::OutForDelivery,
            ]))
            .filter(shipment::Column::CarrierShipmentId.is_not_null())
            .all(db)
            .await?;

        let mut ingested = 0u64;
        for model in candidates {
            let Some(carrier_shipment_id) = model.carrier_shipment_id.clone() else {
                continue;
            };

            match self.gateway.get_tracking(&carrier_shipment_id).await {
                Ok(Some(snapshot)) => {
                    if let Err(e) = self
                        .ingest(&model, snapshot.status, &snapshot.events)
                        .await
                    {
                        warn!(shipment_id = %model.id, "Tracking ingestion failed: {}", e);
                    } else {
                        ingested += 1;
                    }
                }
                Ok(None) => debug!(shipment_id = %model.id, "Carrier has no tracking data yet"),
                Err(e) => warn!(shipment_id = %model.id, "Tracking poll failed: {}", e),
            }
        }

        Ok(ingested)
    }

    /// Webhook worker entry point: attribute the raw payload to a shipment
    /// and ingest. Unattributable or malformed payloads are logged and
    /// dropped; the HTTP acknowledgment already went out.
    #[instrument(skip(self, payload))]
    pub async fn process_webhook_payload(
        &self,
        payload: serde_json::Value,
    ) -> Result<IngestOutcome, ServiceError> {
        let parsed: WebhookPayload = match serde_json::from_value(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Dropping malformed carrier webhook payload: {}", e);
                return Ok(IngestOutcome::default());
            }
        };

        let Some(carrier_shipment_id) = parsed
            .shipment_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        else {
            warn!("Dropping carrier webhook payload without a shipment id");
            return Ok(IngestOutcome::default());
        };

        let db = &*self.db_pool;
        let Some(model) =
            shipment::Model::find_by_carrier_shipment_id(db, carrier_shipment_id).await?
        else {
            warn!(carrier_shipment_id, "Carrier webhook references no known shipment");
            return Ok(IngestOutcome::default());
        };

        let events: Vec<CarrierTrackingEvent> = parsed
            .events
            .iter()
            .filter_map(|event| event.to_carrier_event())
            .collect();

        // Coarse status: the payload field when present, otherwise the
        // status of the newest reported event.
        let carrier_status = parsed
            .status
            .as_deref()
            .and_then(|s| s.parse::<TrackingStatus>().ok())
            .or_else(|| {
                events
                    .iter()
                    .max_by_key(|event| event.event_at)
                    .map(|event| event.status)
            });

        let Some(carrier_status) = carrier_status else {
            warn!(carrier_shipment_id, "Carrier webhook carries no usable status");
            return Ok(IngestOutcome::default());
        };

        self.ingest(&model, carrier_status, &events).await
    }

    /// Public tracking lookup: shipment plus its event history
    /// newest-first, or `None` for an unknown tracking number.
    #[instrument(skip(self))]
    pub async fn track_by_number(
        &self,
        tracking_number: &str,
    ) -> Result<Option<(shipment::Model, Vec<shipment_event::Model>)>, ServiceError> {
        let db = &*self.db_pool;

        let Some(model) = shipment::Model::find_by_tracking(db, tracking_number).await? else {
            return Ok(None);
        };

        let events = shipment_event::Entity::find()
            .filter(shipment_event::Column::ShipmentId.eq(model.id))
            .order_by_desc(shipment_event::Column::EventAt)
            .all(db)
            .await?;

        Ok(Some((model, events)))
    }
}

/// Tolerantly parsed carrier webhook body
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default, alias = "carrier_shipment_id")]
    shipment_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    event_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    /// Individual events missing the fields that make them storable are
    /// skipped, not fatal for the rest of the payload.
    fn to_carrier_event(&self) -> Option<CarrierTrackingEvent> {
        let event_at = self.event_at?;
        let status = self.status.as_deref()?.parse::<TrackingStatus>().ok()?;
        let description = self
            .description
            .clone()
            .or_else(|| self.code.clone())
            .filter(|s| !s.trim().is_empty())?;

        Some(CarrierTrackingEvent {
            code: self.code.clone(),
            description,
            status,
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
            event_at,
        })
    }
}
