mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::TestApp;
use fulfillment_api::message_queue::FulfillmentTask;

#[tokio::test]
async fn webhook_acknowledges_and_enqueues_json_payloads() {
    let mut app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/webhooks/carrier",
            Some(json!({ "shipment_id": "SHP-000001", "status": "posted" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = TestApp::json_body(response).await;
    assert_eq!(body["status"], "received");

    let envelope = app.task_rx.try_recv().expect("payload must be queued");
    match envelope.task {
        FulfillmentTask::ProcessWebhook { payload } => {
            assert_eq!(payload["shipment_id"], "SHP-000001");
        }
        other => panic!("unexpected task: {:?}", other),
    }
}

#[tokio::test]
async fn non_json_body_is_acknowledged_but_not_queued() {
    let mut app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/carrier")
        .header("content-type", "text/plain")
        .body(Body::from("definitely not json"))
        .expect("build request");
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router error");

    // The carrier only understands 200; garbage is dropped after the ack
    assert_eq!(response.status(), StatusCode::OK);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["status"], "received");

    assert!(app.task_rx.try_recv().is_err(), "nothing should be queued");
}

#[tokio::test]
async fn queued_webhook_for_unknown_shipment_processes_cleanly() {
    let mut app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/webhooks/carrier",
            Some(json!({ "shipment_id": "SHP-does-not-exist", "status": "in_transit" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Run the queued task the way a worker would
    let envelope = app.task_rx.try_recv().expect("payload must be queued");
    let FulfillmentTask::ProcessWebhook { payload } = envelope.task else {
        panic!("unexpected task kind");
    };
    let outcome = app
        .state
        .tracking_service()
        .process_webhook_payload(payload)
        .await
        .expect("unknown shipment is not an error");
    assert!(outcome.new_events.is_empty());
}
