use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{fulfillment_failure, shipment};
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Filter by shipment status (pending, cart_added, purchased, generated,
    /// posted, in_transit, out_for_delivery, delivered, returned, cancelled)
    pub status: Option<String>,
    /// Filter by owning order
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "990e8400-e29b-41d4-a716-446655440000",
    "order_id": "550e8400-e29b-41d4-a716-446655440000",
    "carrier_name": "Correios",
    "service_name": "SEDEX",
    "status": "in_transit",
    "tracking_number": "MC000000123BR",
    "recipient_name": "John Doe",
    "city": "Sao Paulo",
    "state": "SP",
    "posted_at": "2024-12-09T14:30:00Z",
    "delivered_at": null,
    "created_at": "2024-12-09T10:30:00Z",
    "updated_at": "2024-12-09T14:30:00Z"
}))]
pub struct ShipmentSummary {
    /// Shipment UUID
    pub id: Uuid,
    /// Owning order UUID
    pub order_id: Uuid,
    /// Carrier display name
    #[schema(example = "Correios")]
    pub carrier_name: String,
    /// Carrier service selected at checkout
    #[schema(example = "SEDEX")]
    pub service_name: String,
    /// Current shipment status
    #[schema(example = "in_transit")]
    pub status: String,
    /// Carrier tracking number, once a label exists
    pub tracking_number: Option<String>,
    /// Recipient name
    #[schema(example = "John Doe")]
    pub recipient_name: String,
    pub city: String,
    pub state: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<shipment::Model> for ShipmentSummary {
    fn from(model: shipment::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            carrier_name: model.carrier_name,
            service_name: model.service_name,
            status: model.status.to_string(),
            tracking_number: model.tracking_number,
            recipient_name: model.recipient_name,
            city: model.city,
            state: model.state,
            posted_at: model.posted_at,
            delivered_at: model.delivered_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Full shipment view, including the recipient snapshot and the carrier
/// identifiers acquired so far by the label workflow
#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub carrier_name: String,
    pub service_code: String,
    pub service_name: String,
    #[schema(value_type = String, example = "24.90")]
    pub shipping_cost: rust_decimal::Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub insurance_cost: rust_decimal::Decimal,
    #[schema(value_type = String, example = "1.250")]
    pub weight_kg: rust_decimal::Decimal,
    pub dimensions_cm: Option<String>,
    pub recipient_name: String,
    pub recipient_document: Option<String>,
    pub recipient_phone: Option<String>,
    pub recipient_email: Option<String>,
    /// Single-line delivery address
    pub shipping_address: String,
    pub delivery_min_days: i32,
    pub delivery_max_days: i32,
    pub cart_reference: Option<String>,
    pub carrier_shipment_id: Option<String>,
    pub tracking_number: Option<String>,
    pub label_url: Option<String>,
    pub status: String,
    pub label_generated_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<shipment::Model> for ShipmentDetail {
    fn from(model: shipment::Model) -> Self {
        let shipping_address = model.formatted_address();
        Self {
            id: model.id,
            order_id: model.order_id,
            carrier_name: model.carrier_name,
            service_code: model.service_code,
            service_name: model.service_name,
            shipping_cost: model.shipping_cost,
            insurance_cost: model.insurance_cost,
            weight_kg: model.weight_kg,
            dimensions_cm: model.dimensions_cm,
            recipient_name: model.recipient_name,
            recipient_document: model.recipient_document,
            recipient_phone: model.recipient_phone,
            recipient_email: model.recipient_email,
            shipping_address,
            delivery_min_days: model.delivery_min_days,
            delivery_max_days: model.delivery_max_days,
            cart_reference: model.cart_reference,
            carrier_shipment_id: model.carrier_shipment_id,
            tracking_number: model.tracking_number,
            label_url: model.label_url,
            status: model.status.to_string(),
            label_generated_at: model.label_generated_at,
            posted_at: model.posted_at,
            delivered_at: model.delivered_at,
            cancelled_at: model.cancelled_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({ "order_id": "550e8400-e29b-41d4-a716-446655440000" }))]
pub struct CreateShipmentRequest {
    /// Paid order to fulfill
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct GenerateLabelRequest {
    /// Send the tracking-code email to the recipient once the label exists
    #[serde(default = "default_notify")]
    pub notify: bool,
}

fn default_notify() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "shipment_ids": ["990e8400-e29b-41d4-a716-446655440000"],
    "notify": true
}))]
pub struct DispatchBatchRequest {
    #[validate(length(min = 1, max = 500))]
    pub shipment_ids: Vec<Uuid>,
    #[serde(default = "default_notify")]
    pub notify: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchBatchResponse {
    /// How many shipments were actually queued for label generation
    pub scheduled: usize,
    /// How many ids were requested
    pub requested: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueuedResponse {
    pub shipment_id: Uuid,
    pub task_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FailureRecord {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub step: String,
    pub message: String,
    pub attempts: i32,
    pub failed_at: DateTime<Utc>,
}

impl From<fulfillment_failure::Model> for FailureRecord {
    fn from(model: fulfillment_failure::Model) -> Self {
        Self {
            id: model.id,
            shipment_id: model.shipment_id,
            step: model.step,
            message: model.message,
            attempts: model.attempts,
            failed_at: model.failed_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Shipments listed", body = ApiResponse<PaginatedResponse<ShipmentSummary>>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentSummary>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (records, total) = state
        .shipment_service()
        .list_shipments(page, limit, query.status, query.order_id)
        .await?;

    let items: Vec<ShipmentSummary> = records.into_iter().map(ShipmentSummary::from).collect();
    let total_pages = total.div_ceil(limit);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/:id",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment fetched", body = ApiResponse<ShipmentDetail>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentDetail> {
    match state.shipment_service().get_shipment(id).await? {
        Some(model) => Ok(Json(ApiResponse::success(ShipmentDetail::from(model)))),
        None => Err(ServiceError::NotFound(format!("Shipment {} not found", id))),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments",
    request_body = CreateShipmentRequest,
    responses(
        (status = 201, description = "Shipment created", body = ApiResponse<ShipmentDetail>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order not paid or already has a shipment", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    Json(payload): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ShipmentDetail>>), ServiceError> {
    let created = state
        .shipment_service()
        .create_from_order(payload.order_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ShipmentDetail::from(created))),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/:id/generate-label",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = GenerateLabelRequest,
    responses(
        (status = 202, description = "Label generation queued", body = ApiResponse<QueuedResponse>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Shipment not eligible for label generation", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn generate_label(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<GenerateLabelRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<QueuedResponse>>), ServiceError> {
    let notify = payload.map(|Json(p)| p.notify).unwrap_or(true);
    let task_id = state.label_service().enqueue_generate(id, notify).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(QueuedResponse {
            shipment_id: id,
            task_id,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/generate-labels",
    request_body = DispatchBatchRequest,
    responses(
        (status = 202, description = "Batch queued", body = ApiResponse<DispatchBatchResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn dispatch_batch(
    State(state): State<AppState>,
    Json(payload): Json<DispatchBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DispatchBatchResponse>>), ServiceError> {
    payload
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let scheduled = state
        .label_service()
        .dispatch_batch(&payload.shipment_ids, payload.notify)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(DispatchBatchResponse {
            scheduled,
            requested: payload.shipment_ids.len(),
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/:id/cancel",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment cancelled", body = ApiResponse<ShipmentDetail>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Shipment already dispatched", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn cancel_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentDetail> {
    let updated = state.shipment_service().cancel_shipment(id).await?;
    Ok(Json(ApiResponse::success(ShipmentDetail::from(updated))))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/:id/mark-posted",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment marked as posted", body = ApiResponse<ShipmentDetail>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Shipment has no label yet", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn mark_posted(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentDetail> {
    let updated = state.shipment_service().mark_posted(id).await?;
    Ok(Json(ApiResponse::success(ShipmentDetail::from(updated))))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/failures",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Failure records listed", body = ApiResponse<PaginatedResponse<FailureRecord>>)
    ),
    tag = "shipments"
)]
pub async fn list_failures(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<FailureRecord>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (records, total) = state.shipment_service().list_failures(page, limit).await?;

    let items: Vec<FailureRecord> = records.into_iter().map(FailureRecord::from).collect();
    let total_pages = total.div_ceil(limit);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}
