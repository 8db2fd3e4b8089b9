//! Carrier gateway boundary.
//!
//! Every concrete shipping integration implements [`CarrierGateway`]; the
//! label workflow and tracking ingestion only ever see the trait object.
//! The contract is deliberately not idempotent on the carrier side: the
//! workflow persists each returned identifier before advancing status, and
//! the narrow crash window between a successful remote call and that
//! persist is an accepted limitation of non-transactional cross-system
//! calls.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::shipment;
use crate::models::shipment_event::TrackingStatus;

pub use memory::MemoryCarrier;

/// The label workflow step being executed when an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStep {
    AddToCart,
    Checkout,
    GenerateLabel,
    Cancel,
}

impl fmt::Display for FulfillmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FulfillmentStep::AddToCart => write!(f, "add_to_cart"),
            FulfillmentStep::Checkout => write!(f, "checkout"),
            FulfillmentStep::GenerateLabel => write!(f, "generate_label"),
            FulfillmentStep::Cancel => write!(f, "cancel"),
        }
    }
}

/// Gateway failure taxonomy. Transient failures (timeouts, 5xx, rate
/// limits) are retryable by the queue's backoff policy; rejections
/// (invalid dimensions, carrier refused) need operator correction.
#[derive(Error, Debug, Clone)]
pub enum CarrierError {
    #[error("carrier temporarily unavailable: {0}")]
    Transient(String),

    #[error("carrier rejected the request: {0}")]
    Rejected(String),
}

impl CarrierError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CarrierError::Transient(_))
    }
}

/// Shipment attributes handed to `add_to_cart`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartRequest {
    pub service_code: String,
    pub recipient_name: String,
    pub recipient_document: Option<String>,
    pub recipient_phone: Option<String>,
    pub recipient_email: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub weight_kg: Decimal,
    pub dimensions_cm: Option<String>,
    pub insured_value: Decimal,
}

impl From<&shipment::Model> for CartRequest {
    fn from(shipment: &shipment::Model) -> Self {
        Self {
            service_code: shipment.service_code.clone(),
            recipient_name: shipment.recipient_name.clone(),
            recipient_document: shipment.recipient_document.clone(),
            recipient_phone: shipment.recipient_phone.clone(),
            recipient_email: shipment.recipient_email.clone(),
            address_line1: shipment.address_line1.clone(),
            address_line2: shipment.address_line2.clone(),
            city: shipment.city.clone(),
            state: shipment.state.clone(),
            postal_code: shipment.postal_code.clone(),
            country: shipment.country.clone(),
            weight_kg: shipment.weight_kg,
            dimensions_cm: shipment.dimensions_cm.clone(),
            insured_value: shipment.insurance_cost,
        }
    }
}

/// Result of `generate_label`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelInfo {
    pub label_url: String,
    pub tracking_number: String,
}

/// One carrier-reported tracking event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierTrackingEvent {
    pub code: Option<String>,
    pub description: String,
    pub status: TrackingStatus,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub event_at: DateTime<Utc>,
}

/// Snapshot returned by `get_tracking`: the carrier's current coarse status
/// plus the full event list it knows about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    pub status: TrackingStatus,
    pub events: Vec<CarrierTrackingEvent>,
}

/// Abstract contract a concrete carrier integration must satisfy.
///
/// `get_tracking` returns `Ok(None)` when the carrier has no data yet for
/// the shipment; that is not an error.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    /// Display name of the carrier behind this gateway
    fn carrier_name(&self) -> &str;

    async fn add_to_cart(&self, request: &CartRequest) -> Result<String, CarrierError>;

    async fn checkout(&self, cart_reference: &str) -> Result<String, CarrierError>;

    async fn generate_label(&self, carrier_shipment_id: &str) -> Result<LabelInfo, CarrierError>;

    async fn get_tracking(
        &self,
        carrier_shipment_id: &str,
    ) -> Result<Option<TrackingSnapshot>, CarrierError>;

    async fn cancel_shipment(&self, carrier_shipment_id: &str) -> Result<bool, CarrierError>;
}
