use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment state of an order. Fulfillment only cares about `paid`: a
/// shipment is created when the order is confirmed paid, and nothing here
/// is written by the fulfillment side.
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
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "refunded")]
    Refunded,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Order entity, consumed read-only by fulfillment.
///
/// Checkout selects the carrier service and computes the shipping/insurance
/// costs before payment; those land here and are copied into the shipment
/// snapshot when the order is confirmed paid.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_number: String,

    pub payment_status: PaymentStatus,

    pub total_amount: Decimal,
    pub currency: String,

    pub customer_name: String,
    pub customer_document: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,

    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,

    /// Shipping selection made at checkout
    pub carrier_name: String,
    pub service_code: String,
    pub service_name: String,
    pub shipping_cost: Decimal,
    pub insurance_cost: Decimal,
    pub weight_kg: Decimal,
    pub dimensions_cm: Option<String>,
    pub delivery_min_days: i32,
    pub delivery_max_days: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }
}
