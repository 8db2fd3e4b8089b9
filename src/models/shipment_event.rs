use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse tracking vocabulary carriers report against.
///
/// Detailed carrier event codes are kept verbatim on the event row; this is
/// the fixed label the status derivation works with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrackingStatus {
    #[sea_orm(string_value = "posted")]
    Posted,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "out_for_delivery")]
    OutForDelivery,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "exception")]
    Exception,
}

/// Append-only tracking event, written exclusively by the tracking
/// ingestion service.
///
/// `event_key` materializes the dedup key (carrier code if present,
/// otherwise the description) so the `(shipment_id, event_key, event_at)`
/// unique index can absorb duplicate deliveries without coordination.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipment_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub shipment_id: Uuid,

    /// Carrier event code (e.g. "BDE", "RO"); optional
    pub code: Option<String>,

    pub description: String,

    pub event_key: String,

    pub status: TrackingStatus,

    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,

    /// Carrier-reported time of the event, distinct from ingestion time
    pub event_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment::Entity",
        from = "Column::ShipmentId",
        to = "super::shipment::Column::Id",
        on_delete = "Cascade"
    )]
    Shipment,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Dedup key for a carrier-reported event: code when the carrier assigns
/// one, description otherwise.
pub fn dedup_key(code: Option<&str>, description: &str) -> String {
    match code {
        Some(code) if !code.trim().is_empty() => code.trim().to_string(),
        _ => description.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_prefers_code() {
        assert_eq!(dedup_key(Some("BDE"), "Delivered to recipient"), "BDE");
    }

    #[test]
    fn dedup_key_falls_back_to_description() {
        assert_eq!(dedup_key(None, "Object posted"), "Object posted");
        assert_eq!(dedup_key(Some("  "), "Object posted"), "Object posted");
    }

    #[test]
    fn tracking_status_parses_snake_case() {
        let parsed: TrackingStatus = "out_for_delivery".parse().unwrap();
        assert_eq!(parsed, TrackingStatus::OutForDelivery);
        assert_eq!(TrackingStatus::Exception.to_string(), "exception");
    }
}
