//! Domain events and the background event loop.
//!
//! Events are observational: services emit them after a state change has
//! been durably persisted. The loop reacts to the order-paid trigger (which
//! creates the shipment record) and forwards status transitions to the
//! notification dispatcher.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::ShipmentStatus;
use crate::services::notifications::NotificationDispatcher;
use crate::services::shipments::ShipmentService;

/// Events emitted by the fulfillment core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// The order/payment subsystem confirmed payment; triggers shipment
    /// creation
    OrderPaid { order_id: Uuid },

    ShipmentCreated {
        shipment_id: Uuid,
        order_id: Uuid,
    },

    LabelGenerated {
        shipment_id: Uuid,
        tracking_number: String,
    },

    ShipmentStatusChanged {
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
    },

    ShipmentCancelled { shipment_id: Uuid },

    /// A queued fulfillment task exhausted its retries
    FulfillmentFailed {
        shipment_id: Uuid,
        step: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background loop draining the event channel.
///
/// Runs until every sender is dropped. Failures inside a reaction are
/// logged, never propagated; the loop must outlive any single bad event.
pub async fn process_events(
    mut receiver: mpsc::Receiver<Event>,
    shipments: Arc<ShipmentService>,
    notifier: Arc<dyn NotificationDispatcher>,
) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match event {
            Event::OrderPaid { order_id } => {
                match shipments.create_from_order(order_id).await {
                    Ok(shipment) => {
                        info!(%order_id, shipment_id = %shipment.id, "Shipment created for paid order")
                    }
                    Err(e) => {
                        error!(%order_id, "Failed to create shipment for paid order: {}", e)
                    }
                }
            }
            Event::ShipmentStatusChanged {
                shipment_id,
                old_status,
                new_status,
            } => {
                notifier
                    .status_changed(shipment_id, old_status, new_status)
                    .await;
            }
            Event::ShipmentCreated {
                shipment_id,
                order_id,
            } => {
                info!(%shipment_id, %order_id, "Shipment created");
            }
            Event::LabelGenerated {
                shipment_id,
                ref tracking_number,
            } => {
                info!(%shipment_id, tracking_number, "Label generated");
            }
            Event::ShipmentCancelled { shipment_id } => {
                info!(%shipment_id, "Shipment cancelled");
            }
            Event::FulfillmentFailed {
                shipment_id,
                ref step,
                ref message,
            } => {
                warn!(%shipment_id, step, message, "Fulfillment permanently failed");
            }
        }
    }
    info!("Event processor stopped");
}
