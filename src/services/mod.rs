pub mod labels;
pub mod notifications;
pub mod shipments;
pub mod tracking;
