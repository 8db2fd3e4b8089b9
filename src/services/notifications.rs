//! Notification dispatcher boundary.
//!
//! The real notification system (e-mail, push) lives outside this service;
//! fulfillment only hands off. The logging implementation is the default
//! backend and doubles as the development stub.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::models::shipment;
use crate::models::ShipmentStatus;

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Called exactly once per shipment, when its label first becomes
    /// available and the customer asked to be notified. The caller has
    /// already checked that a recipient email exists.
    async fn label_generated(&self, shipment: &shipment::Model);

    /// Consumes status transitions for delivery/exception notices
    async fn status_changed(
        &self,
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
    );
}

/// Dispatcher that only records the handoff in the log
#[derive(Debug, Default, Clone)]
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn label_generated(&self, shipment: &shipment::Model) {
        info!(
            shipment_id = %shipment.id,
            recipient = shipment.recipient_email.as_deref().unwrap_or(""),
            tracking_number = shipment.tracking_number.as_deref().unwrap_or(""),
            "Notify: shipping label available"
        );
    }

    async fn status_changed(
        &self,
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
    ) {
        info!(
            %shipment_id,
            from = %old_status,
            to = %new_status,
            "Notify: shipment status changed"
        );
    }
}
