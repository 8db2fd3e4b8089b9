//! In-process carrier fake.
//!
//! Default backend in development: assigns identifiers the way a real
//! carrier would without leaving the process. Tracking data can be scripted
//! through [`MemoryCarrier::push_tracking`], which the tests use to drive
//! ingestion.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{CarrierError, CarrierGateway, CartRequest, LabelInfo, TrackingSnapshot};

#[derive(Debug, Default)]
pub struct MemoryCarrier {
    counter: AtomicU64,
    /// cart reference → accepted cart request
    carts: DashMap<String, CartRequest>,
    /// carrier shipment id → cart reference it was checked out from
    shipments: DashMap<String, String>,
    /// carrier shipment id → scripted tracking snapshot
    tracking: DashMap<String, TrackingSnapshot>,
    /// carrier shipment ids that were cancelled
    cancelled: DashMap<String, ()>,
}

impl MemoryCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Script the tracking snapshot returned for a carrier shipment id
    pub fn push_tracking(&self, carrier_shipment_id: &str, snapshot: TrackingSnapshot) {
        self.tracking
            .insert(carrier_shipment_id.to_string(), snapshot);
    }

    pub fn was_cancelled(&self, carrier_shipment_id: &str) -> bool {
        self.cancelled.contains_key(carrier_shipment_id)
    }
}

#[async_trait]
impl CarrierGateway for MemoryCarrier {
    fn carrier_name(&self) -> &str {
        "MemoryCarrier"
    }

    async fn add_to_cart(&self, request: &CartRequest) -> Result<String, CarrierError> {
        if request.recipient_name.trim().is_empty() {
            return Err(CarrierError::Rejected("recipient name is required".into()));
        }
        let cart_reference = format!("CART-{:06}", self.next_id());
        self.carts.insert(cart_reference.clone(), request.clone());
        Ok(cart_reference)
    }

    async fn checkout(&self, cart_reference: &str) -> Result<String, CarrierError> {
        if !self.carts.contains_key(cart_reference) {
            return Err(CarrierError::Rejected(format!(
                "unknown cart reference {}",
                cart_reference
            )));
        }
        let carrier_shipment_id = format!("SHP-{:06}", self.next_id());
        self.shipments
            .insert(carrier_shipment_id.clone(), cart_reference.to_string());
        Ok(carrier_shipment_id)
    }

    async fn generate_label(&self, carrier_shipment_id: &str) -> Result<LabelInfo, CarrierError> {
        if !self.shipments.contains_key(carrier_shipment_id) {
            return Err(CarrierError::Rejected(format!(
                "unknown carrier shipment id {}",
                carrier_shipment_id
            )));
        }
        let serial = self.next_id();
        Ok(LabelInfo {
            label_url: format!("https://labels.local/{}.pdf", carrier_shipment_id),
            tracking_number: format!("MC{:09}BR", serial),
        })
    }

    async fn get_tracking(
        &self,
        carrier_shipment_id: &str,
    ) -> Result<Option<TrackingSnapshot>, CarrierError> {
        Ok(self
            .tracking
            .get(carrier_shipment_id)
            .map(|entry| entry.clone()))
    }

    async fn cancel_shipment(&self, carrier_shipment_id: &str) -> Result<bool, CarrierError> {
        if self.shipments.remove(carrier_shipment_id).is_some() {
            self.cancelled.insert(carrier_shipment_id.to_string(), ());
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::shipment_event::TrackingStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn request() -> CartRequest {
        CartRequest {
            service_code: "04014".into(),
            recipient_name: "Ana Souza".into(),
            recipient_document: None,
            recipient_phone: None,
            recipient_email: Some("ana@example.com".into()),
            address_line1: "Rua das Flores 100".into(),
            address_line2: None,
            city: "Sao Paulo".into(),
            state: "SP".into(),
            postal_code: "01000-000".into(),
            country: "BR".into(),
            weight_kg: dec!(0.5),
            dimensions_cm: Some("20x15x10".into()),
            insured_value: dec!(100.00),
        }
    }

    #[tokio::test]
    async fn full_label_flow_assigns_identifiers() {
        let carrier = MemoryCarrier::new();
        let cart = carrier.add_to_cart(&request()).await.unwrap();
        assert!(cart.starts_with("CART-"));

        let shipment_id = carrier.checkout(&cart).await.unwrap();
        assert!(shipment_id.starts_with("SHP-"));

        let label = carrier.generate_label(&shipment_id).await.unwrap();
        assert!(label.tracking_number.starts_with("MC"));
        assert!(label.label_url.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn checkout_of_unknown_cart_is_rejected() {
        let carrier = MemoryCarrier::new();
        let err = carrier.checkout("CART-999999").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn cancel_is_only_true_for_known_shipments() {
        let carrier = MemoryCarrier::new();
        assert!(!carrier.cancel_shipment("SHP-000001").await.unwrap());

        let cart = carrier.add_to_cart(&request()).await.unwrap();
        let shipment_id = carrier.checkout(&cart).await.unwrap();
        assert!(carrier.cancel_shipment(&shipment_id).await.unwrap());
        assert!(carrier.was_cancelled(&shipment_id));
    }

    #[tokio::test]
    async fn tracking_returns_scripted_snapshot() {
        let carrier = MemoryCarrier::new();
        assert!(carrier.get_tracking("SHP-1").await.unwrap().is_none());

        carrier.push_tracking(
            "SHP-1",
            TrackingSnapshot {
                status: TrackingStatus::InTransit,
                events: vec![super::super::CarrierTrackingEvent {
                    code: Some("RO".into()),
                    description: "Object in transit".into(),
                    status: TrackingStatus::InTransit,
                    city: Some("Curitiba".into()),
                    state: Some("PR".into()),
                    country: Some("BR".into()),
                    event_at: Utc::now(),
                }],
            },
        );

        let snapshot = carrier.get_tracking("SHP-1").await.unwrap().unwrap();
        assert_eq!(snapshot.status, TrackingStatus::InTransit);
        assert_eq!(snapshot.events.len(), 1);
    }
}
