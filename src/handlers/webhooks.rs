use axum::{body::Bytes, extract::State, response::Json};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::message_queue::{FulfillmentTask, RetryPolicy};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    #[schema(example = "received")]
    pub status: &'static str,
}

/// Carrier webhook intake.
///
/// Always acknowledges with 200 so the carrier does not retry against us;
/// the payload is validated and attributed later by a queue worker. A body
/// that is not even JSON is logged and dropped here, still with a 200.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/carrier",
    request_body = String,
    responses(
        (status = 200, description = "Payload acknowledged", body = WebhookAck)
    ),
    tag = "webhooks"
)]
pub async fn carrier_webhook(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => {
            debug!(bytes = body.len(), "Carrier webhook received");
            if let Err(e) = state
                .queue
                .enqueue(
                    FulfillmentTask::ProcessWebhook { payload },
                    RetryPolicy::default(),
                )
                .await
            {
                warn!("Failed to queue carrier webhook payload: {}", e);
            }
        }
        Err(e) => {
            warn!(bytes = body.len(), "Discarding non-JSON carrier webhook body: {}", e);
        }
    }

    Json(WebhookAck { status: "received" })
}
