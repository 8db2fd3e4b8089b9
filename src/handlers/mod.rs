pub mod shipments;
pub mod tracking;
pub mod webhooks;

use std::sync::Arc;

use crate::services::labels::LabelService;
use crate::services::shipments::ShipmentService;
use crate::services::tracking::TrackingService;

/// Service handles shared by every handler through [`crate::AppState`]
#[derive(Clone)]
pub struct AppServices {
    pub shipments: Arc<ShipmentService>,
    pub labels: Arc<LabelService>,
    pub tracking: Arc<TrackingService>,
}

impl AppServices {
    pub fn new(
        shipments: Arc<ShipmentService>,
        labels: Arc<LabelService>,
        tracking: Arc<TrackingService>,
    ) -> Self {
        Self {
            shipments,
            labels,
            tracking,
        }
    }
}
