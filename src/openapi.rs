use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fulfillment API",
        version = "0.2.0",
        description = r#"
# Shipment Fulfillment API

Orchestrates the post-purchase life of a shipment: label generation against
the carrier gateway, tracking ingestion from carrier polls and webhooks, and
a public tracking endpoint.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).

## Asynchronous operations

Label generation runs on a background queue; the generate endpoints return
`202 Accepted` with a task id and the shipment advances as the workflow
completes. Failures that exhaust their retry budget surface on the
`/shipments/failures` endpoint.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "shipments", description = "Shipment lifecycle and label generation"),
        (name = "tracking", description = "Public tracking lookup"),
        (name = "webhooks", description = "Carrier webhook intake")
    ),
    paths(
        crate::handlers::shipments::list_shipments,
        crate::handlers::shipments::get_shipment,
        crate::handlers::shipments::create_shipment,
        crate::handlers::shipments::generate_label,
        crate::handlers::shipments::dispatch_batch,
        crate::handlers::shipments::cancel_shipment,
        crate::handlers::shipments::mark_posted,
        crate::handlers::shipments::list_failures,
        crate::handlers::tracking::track_shipment,
        crate::handlers::webhooks::carrier_webhook,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::handlers::shipments::ShipmentSummary,
            crate::handlers::shipments::ShipmentDetail,
            crate::handlers::shipments::CreateShipmentRequest,
            crate::handlers::shipments::GenerateLabelRequest,
            crate::handlers::shipments::DispatchBatchRequest,
            crate::handlers::shipments::DispatchBatchResponse,
            crate::handlers::shipments::QueuedResponse,
            crate::handlers::shipments::FailureRecord,
            crate::handlers::tracking::TrackingInfo,
            crate::handlers::tracking::TrackingEventInfo,
            crate::handlers::webhooks::WebhookAck,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
