use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::models::{shipment, shipment_event};
use crate::{ApiResponse, ApiResult, AppState};

/// Public tracking view: no recipient document, no cost, no label URL
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "tracking_number": "MC000000123BR",
    "carrier_name": "Correios",
    "service_name": "SEDEX",
    "status": "in_transit",
    "posted_at": "2024-12-09T14:30:00Z",
    "delivered_at": null,
    "events": [{
        "description": "Departed sorting facility",
        "status": "in_transit",
        "location": "Curitiba / PR",
        "event_at": "2024-12-10T08:12:00Z"
    }]
}))]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub carrier_name: String,
    pub service_name: String,
    pub status: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// Event history, newest first
    pub events: Vec<TrackingEventInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingEventInfo {
    pub description: String,
    pub status: String,
    /// "City / ST" when the carrier reported a location
    pub location: Option<String>,
    pub event_at: DateTime<Utc>,
}

impl From<shipment_event::Model> for TrackingEventInfo {
    fn from(model: shipment_event::Model) -> Self {
        let location = match (&model.city, &model.state) {
            (Some(city), Some(state)) => Some(format!("{} / {}", city, state)),
            (Some(city), None) => Some(city.clone()),
            (None, Some(state)) => Some(state.clone()),
            (None, None) => None,
        };
        Self {
            description: model.description,
            status: model.status.to_string(),
            location,
            event_at: model.event_at,
        }
    }
}

impl TrackingInfo {
    fn build(model: shipment::Model, events: Vec<shipment_event::Model>) -> Self {
        Self {
            tracking_number: model.tracking_number.unwrap_or_default(),
            carrier_name: model.carrier_name,
            service_name: model.service_name,
            status: model.status.to_string(),
            posted_at: model.posted_at,
            delivered_at: model.delivered_at,
            events: events.into_iter().map(TrackingEventInfo::from).collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/tracking/:tracking_number",
    params(("tracking_number" = String, Path, description = "Carrier tracking number")),
    responses(
        (status = 200, description = "Tracking history", body = ApiResponse<TrackingInfo>),
        (status = 404, description = "Unknown tracking number", body = crate::errors::ErrorResponse)
    ),
    tag = "tracking"
)]
pub async fn track_shipment(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> ApiResult<TrackingInfo> {
    match state
        .tracking_service()
        .track_by_number(&tracking_number)
        .await?
    {
        Some((model, events)) => Ok(Json(ApiResponse::success(TrackingInfo::build(
            model, events,
        )))),
        None => Err(ServiceError::NotFound(format!(
            "Tracking number {} not found",
            tracking_number
        ))),
    }
}
