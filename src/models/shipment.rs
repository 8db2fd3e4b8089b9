use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::shipment_event::TrackingStatus;

/// Shipment fulfillment status.
///
/// The mainline walk is `pending → cart_added → purchased → generated →
/// posted → in_transit → out_for_delivery → delivered`. `returned` and
/// `cancelled` are terminal side branches; `cancelled` is only reachable
/// before a label exists. All writes go through [`Model::transition_to`] or
/// the rank-guarded conditional update in the tracking service, never by
/// assigning the column directly.
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
pub enum ShipmentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "cart_added")]
    CartAdded,
    #[sea_orm(string_value = "purchased")]
    Purchased,
    #[sea_orm(string_value = "generated")]
    Generated,
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
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl ShipmentStatus {
    /// Position along the canonical ordering. `returned` shares the terminal
    /// rank with `delivered` so neither can overwrite the other; `cancelled`
    /// sits outside the ordering entirely.
    pub fn rank(&self) -> Option<u8> {
        match self {
            ShipmentStatus::Pending => Some(0),
            ShipmentStatus::CartAdded => Some(1),
            ShipmentStatus::Purchased => Some(2),
            ShipmentStatus::Generated => Some(3),
            ShipmentStatus::Posted => Some(4),
            ShipmentStatus::InTransit => Some(5),
            ShipmentStatus::OutForDelivery => Some(6),
            ShipmentStatus::Delivered => Some(7),
            ShipmentStatus::Returned => Some(7),
            ShipmentStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Returned | ShipmentStatus::Cancelled
        )
    }

    /// Pre-dispatch states: the label workflow owns these, and cancellation
    /// is only valid here.
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Pending | ShipmentStatus::CartAdded | ShipmentStatus::Purchased
        )
    }

    /// Whether moving from `self` to `next` is a legal edge.
    ///
    /// Workflow edges advance one step at a time; carrier-driven edges may
    /// skip intermediates (a carrier can report `delivered` right after
    /// `posted`), so any strictly forward move between trackable states is
    /// allowed.
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            ShipmentStatus::Cancelled => self.is_pre_dispatch(),
            ShipmentStatus::Returned => !self.is_pre_dispatch(),
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    /// Maps a carrier's coarse tracking status onto the shipment status
    /// vocabulary. `exception` has no counterpart in the state graph and is
    /// recorded in history only.
    pub fn from_tracking(status: TrackingStatus) -> Option<ShipmentStatus> {
        match status {
            TrackingStatus::Posted => Some(ShipmentStatus::Posted),
            TrackingStatus::InTransit => Some(ShipmentStatus::InTransit),
            TrackingStatus::OutForDelivery => Some(ShipmentStatus::OutForDelivery),
            TrackingStatus::Delivered => Some(ShipmentStatus::Delivered),
            TrackingStatus::Returned => Some(ShipmentStatus::Returned),
            TrackingStatus::Exception => None,
        }
    }
}

/// Custom error type for shipment operations
#[derive(Error, Debug)]
pub enum ShipmentError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ShipmentStatus,
        to: ShipmentStatus,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<ShipmentError> for crate::errors::ServiceError {
    fn from(err: ShipmentError) -> Self {
        match err {
            ShipmentError::Database(e) => crate::errors::ServiceError::DatabaseError(e),
            ShipmentError::NotFound(msg) => crate::errors::ServiceError::NotFound(msg),
            other => crate::errors::ServiceError::InvalidOperation(other.to_string()),
        }
    }
}

/// Shipment entity model.
///
/// The recipient fields are a snapshot taken when the shipment is created;
/// later edits to the owning order must not leak into an already-created
/// shipment, so they are never re-read.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_id: Uuid,

    /// Carrier display name (e.g. "Correios")
    pub carrier_name: String,

    /// Carrier service code + display name selected at purchase
    pub service_code: String,
    pub service_name: String,

    pub shipping_cost: Decimal,
    pub insurance_cost: Decimal,

    pub weight_kg: Decimal,
    pub dimensions_cm: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub recipient_name: String,
    pub recipient_document: Option<String>,
    pub recipient_phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub recipient_email: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,

    /// Delivery estimate window in business days
    pub delivery_min_days: i32,
    pub delivery_max_days: i32,

    /// Carrier-assigned identifiers, acquired progressively by the workflow
    pub cart_reference: Option<String>,
    pub carrier_shipment_id: Option<String>,
    pub tracking_number: Option<String>,
    pub label_url: Option<String>,

    pub status: ShipmentStatus,

    pub label_generated_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,

    #[sea_orm(has_many = "super::shipment_event::Entity")]
    ShipmentEvents,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::shipment_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShipmentEvents.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        if insert && active_model.id.is_not_set() {
            active_model.id = Set(Uuid::new_v4());
        }
        Ok(active_model)
    }
}

impl Model {
    /// Builds the shipment snapshot for a freshly paid order. Recipient,
    /// address, and shipping selection are copied, not referenced; the
    /// shipment keeps its history even if the order is edited later.
    pub fn from_order(order: &super::order::Model, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            carrier_name: order.carrier_name.clone(),
            service_code: order.service_code.clone(),
            service_name: order.service_name.clone(),
            shipping_cost: order.shipping_cost,
            insurance_cost: order.insurance_cost,
            weight_kg: order.weight_kg,
            dimensions_cm: order.dimensions_cm.clone(),
            recipient_name: order.customer_name.clone(),
            recipient_document: order.customer_document.clone(),
            recipient_phone: order.customer_phone.clone(),
            recipient_email: order.customer_email.clone(),
            address_line1: order.address_line1.clone(),
            address_line2: order.address_line2.clone(),
            city: order.city.clone(),
            state: order.state.clone(),
            postal_code: order.postal_code.clone(),
            country: order.country.clone(),
            delivery_min_days: order.delivery_min_days,
            delivery_max_days: order.delivery_max_days,
            cart_reference: None,
            carrier_shipment_id: None,
            tracking_number: None,
            label_url: None,
            status: ShipmentStatus::Pending,
            label_generated_at: None,
            posted_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The label workflow may run (again) only while pre-dispatch
    pub fn can_generate_label(&self) -> bool {
        self.status.is_pre_dispatch()
    }

    /// A physical label cannot be un-issued, so cancel stops being valid
    /// the moment one exists
    pub fn can_cancel(&self) -> bool {
        self.status.is_pre_dispatch()
    }

    /// Trackable once a label exists and the shipment was not cancelled
    pub fn is_trackable(&self) -> bool {
        !matches!(self.status, ShipmentStatus::Cancelled)
            && self.status.rank().is_some_and(|r| {
                r >= ShipmentStatus::Generated.rank().unwrap_or(u8::MAX)
            })
    }

    /// Validating transition. Applies the milestone timestamp belonging to
    /// the newly adopted status; a skipped status never gets its timestamp.
    pub fn transition_to(
        &mut self,
        next: ShipmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), ShipmentError> {
        if !self.status.can_transition_to(next) {
            return Err(ShipmentError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            ShipmentStatus::Generated => self.label_generated_at = Some(now),
            ShipmentStatus::Posted => self.posted_at = Some(now),
            ShipmentStatus::Delivered => self.delivered_at = Some(now),
            ShipmentStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }

        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Full recipient address, single line (display helper)
    pub fn formatted_address(&self) -> String {
        let mut parts = vec![self.address_line1.clone()];
        if let Some(line2) = &self.address_line2 {
            parts.push(line2.clone());
        }
        parts.push(format!("{}, {}", self.city, self.state));
        parts.push(self.postal_code.clone());
        parts.push(self.country.clone());
        parts.join(", ")
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    pub async fn find_by_order_id(
        db: &DatabaseConnection,
        order_id: Uuid,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::OrderId.eq(order_id))
            .all(db)
            .await
    }

    pub async fn find_by_tracking(
        db: &DatabaseConnection,
        tracking_number: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::TrackingNumber.eq(tracking_number))
            .one(db)
            .await
    }

    pub async fn find_by_carrier_shipment_id(
        db: &DatabaseConnection,
        carrier_shipment_id: &str,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::CarrierShipmentId.eq(carrier_shipment_id))
            .one(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn sample(status: ShipmentStatus) -> Model {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            carrier_name: "Correios".into(),
            service_code: "04014".into(),
            service_name: "SEDEX".into(),
            shipping_cost: dec!(24.90),
            insurance_cost: dec!(2.10),
            weight_kg: dec!(0.750),
            dimensions_cm: Some("30x20x10".into()),
            recipient_name: "Ana Souza".into(),
            recipient_document: Some("123.456.789-00".into()),
            recipient_phone: None,
            recipient_email: Some("ana@example.com".into()),
            address_line1: "Rua das Flores 100".into(),
            address_line2: None,
            city: "Sao Paulo".into(),
            state: "SP".into(),
            postal_code: "01000-000".into(),
            country: "BR".into(),
            delivery_min_days: 2,
            delivery_max_days: 5,
            cart_reference: None,
            carrier_shipment_id: None,
            tracking_number: None,
            label_url: None,
            status,
            label_generated_at: None,
            posted_at: None,
            delivered_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case(ShipmentStatus::Pending, ShipmentStatus::CartAdded, true)]
    #[case(ShipmentStatus::CartAdded, ShipmentStatus::Purchased, true)]
    #[case(ShipmentStatus::Purchased, ShipmentStatus::Generated, true)]
    #[case(ShipmentStatus::Generated, ShipmentStatus::Posted, true)]
    #[case(ShipmentStatus::Posted, ShipmentStatus::Delivered, true)]
    #[case(ShipmentStatus::Delivered, ShipmentStatus::Returned, false)]
    #[case(ShipmentStatus::InTransit, ShipmentStatus::Posted, false)]
    #[case(ShipmentStatus::Generated, ShipmentStatus::Cancelled, false)]
    #[case(ShipmentStatus::Purchased, ShipmentStatus::Cancelled, true)]
    #[case(ShipmentStatus::Posted, ShipmentStatus::Returned, true)]
    #[case(ShipmentStatus::Pending, ShipmentStatus::Returned, false)]
    fn transition_edges(
        #[case] from: ShipmentStatus,
        #[case] to: ShipmentStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn skipping_intermediate_states_is_allowed_forward() {
        assert!(ShipmentStatus::Posted.can_transition_to(ShipmentStatus::Delivered));
        assert!(ShipmentStatus::Generated.can_transition_to(ShipmentStatus::InTransit));
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        for next in [
            ShipmentStatus::Pending,
            ShipmentStatus::Posted,
            ShipmentStatus::Returned,
            ShipmentStatus::Cancelled,
        ] {
            assert!(!ShipmentStatus::Delivered.can_transition_to(next));
            assert!(!ShipmentStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn predicates_follow_status() {
        assert!(sample(ShipmentStatus::Pending).can_generate_label());
        assert!(sample(ShipmentStatus::Purchased).can_cancel());
        assert!(!sample(ShipmentStatus::Generated).can_cancel());
        assert!(sample(ShipmentStatus::Generated).is_trackable());
        assert!(sample(ShipmentStatus::Delivered).is_trackable());
        assert!(!sample(ShipmentStatus::Pending).is_trackable());
        assert!(!sample(ShipmentStatus::Cancelled).is_trackable());
    }

    #[test]
    fn transition_sets_milestone_timestamp() {
        let mut shipment = sample(ShipmentStatus::Generated);
        let now = Utc.with_ymd_and_hms(2026, 1, 12, 14, 30, 0).unwrap();
        shipment.transition_to(ShipmentStatus::Posted, now).unwrap();
        assert_eq!(shipment.posted_at, Some(now));
        assert_eq!(shipment.status, ShipmentStatus::Posted);
    }

    #[test]
    fn skipped_status_never_gets_its_timestamp() {
        let mut shipment = sample(ShipmentStatus::Generated);
        let now = Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap();
        shipment
            .transition_to(ShipmentStatus::Delivered, now)
            .unwrap();
        assert_eq!(shipment.delivered_at, Some(now));
        assert!(shipment.posted_at.is_none());
    }

    #[test]
    fn backward_transition_is_rejected() {
        let mut shipment = sample(ShipmentStatus::InTransit);
        let now = Utc::now();
        let err = shipment
            .transition_to(ShipmentStatus::Posted, now)
            .unwrap_err();
        assert!(matches!(err, ShipmentError::InvalidTransition { .. }));
        assert_eq!(shipment.status, ShipmentStatus::InTransit);
    }

    #[test]
    fn status_round_trips_through_strings() {
        let parsed: ShipmentStatus = "out_for_delivery".parse().unwrap();
        assert_eq!(parsed, ShipmentStatus::OutForDelivery);
        assert_eq!(ShipmentStatus::CartAdded.to_string(), "cart_added");
    }
}
