pub mod fulfillment_failure;
pub mod order;
pub mod shipment;
pub mod shipment_event;

pub use order::PaymentStatus;
pub use shipment::{ShipmentError, ShipmentStatus};
pub use shipment_event::TrackingStatus;
