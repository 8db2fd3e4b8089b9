//! Fulfillment API Library
//!
//! Shipment fulfillment core: label generation workflow, tracking
//! ingestion, batch dispatch and the public tracking endpoint.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod carriers;
pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod message_queue;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod workers;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::message_queue::TaskQueue;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub queue: Arc<dyn TaskQueue>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn shipment_service(&self) -> Arc<services::shipments::ShipmentService> {
        self.services.shipments.clone()
    }

    pub fn label_service(&self) -> Arc<services::labels::LabelService> {
        self.services.labels.clone()
    }

    pub fn tracking_service(&self) -> Arc<services::tracking::TrackingService> {
        self.services.tracking.clone()
    }
}

// Common response wrappers
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Routes mounted under `/api/v1`
fn api_routes() -> Router<AppState> {
    let shipments = Router::new()
        .route(
            "/shipments",
            get(handlers::shipments::list_shipments).post(handlers::shipments::create_shipment),
        )
        .route(
            "/shipments/failures",
            get(handlers::shipments::list_failures),
        )
        .route(
            "/shipments/generate-labels",
            post(handlers::shipments::dispatch_batch),
        )
        .route("/shipments/:id", get(handlers::shipments::get_shipment))
        .route(
            "/shipments/:id/generate-label",
            post(handlers::shipments::generate_label),
        )
        .route(
            "/shipments/:id/cancel",
            post(handlers::shipments::cancel_shipment),
        )
        .route(
            "/shipments/:id/mark-posted",
            post(handlers::shipments::mark_posted),
        );

    let tracking = Router::new().route(
        "/tracking/:tracking_number",
        get(handlers::tracking::track_shipment),
    );

    let webhooks = Router::new().route(
        "/webhooks/carrier",
        post(handlers::webhooks::carrier_webhook),
    );

    Router::new().merge(shipments).merge(tracking).merge(webhooks)
}

/// Builds the full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .merge(openapi::swagger_ui())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
