mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::TestApp;
use fulfillment_api::message_queue::FulfillmentTask;
use fulfillment_api::models::PaymentStatus;

#[tokio::test]
async fn create_shipment_requires_a_paid_order() {
    let app = TestApp::new().await;

    let paid = app.seed_paid_order().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "order_id": paid.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["carrier_name"], "Correios");
    assert_eq!(body["data"]["recipient_name"], "Maria Silva");

    let unpaid = app.seed_order(PaymentStatus::Pending).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "order_id": unpaid.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "order_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn an_order_gets_at_most_one_shipment() {
    let app = TestApp::new().await;
    let order = app.seed_paid_order().await;

    let first = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "order_id": order.id })),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(json!({ "order_id": order.id })),
        )
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn generate_label_endpoint_queues_a_task() {
    let mut app = TestApp::new().await;
    let order = app.seed_paid_order().await;
    let shipment = app
        .state
        .shipment_service()
        .create_from_order(order.id)
        .await
        .expect("create shipment");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/generate-label", shipment.id),
            Some(json!({ "notify": false })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["shipment_id"], shipment.id.to_string());

    let envelope = app.task_rx.try_recv().expect("task queued");
    match envelope.task {
        FulfillmentTask::GenerateLabel {
            shipment_id,
            notify,
        } => {
            assert_eq!(shipment_id, shipment.id);
            assert!(!notify);
        }
        other => panic!("unexpected task: {:?}", other),
    }

    // Unknown shipment is rejected before anything is queued
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/generate-label", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.task_rx.try_recv().is_err());
}

#[tokio::test]
async fn batch_dispatch_schedules_only_eligible_shipments() {
    let mut app = TestApp::new().await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let order = app.seed_paid_order().await;
        let shipment = app
            .state
            .shipment_service()
            .create_from_order(order.id)
            .await
            .expect("create shipment");
        ids.push(shipment.id);
    }

    // One already cancelled, one unknown
    let order = app.seed_paid_order().await;
    let cancelled = app
        .state
        .shipment_service()
        .create_from_order(order.id)
        .await
        .expect("create shipment");
    app.state
        .shipment_service()
        .cancel_shipment(cancelled.id)
        .await
        .expect("cancel");
    ids.push(cancelled.id);
    ids.push(Uuid::new_v4());

    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments/generate-labels",
            Some(json!({ "shipment_ids": ids, "notify": true })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["scheduled"], 3);
    assert_eq!(body["data"]["requested"], 5);

    let mut queued = 0;
    while app.task_rx.try_recv().is_ok() {
        queued += 1;
    }
    assert_eq!(queued, 3);
}

#[tokio::test]
async fn cancel_is_rejected_once_a_label_exists() {
    let app = TestApp::new().await;
    let order = app.seed_paid_order().await;
    let shipment = app
        .state
        .shipment_service()
        .create_from_order(order.id)
        .await
        .expect("create shipment");

    app.state
        .label_service()
        .generate_label(shipment.id, false)
        .await
        .expect("label workflow");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/cancel", shipment.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_before_dispatch_succeeds() {
    let app = TestApp::new().await;
    let order = app.seed_paid_order().await;
    let shipment = app
        .state
        .shipment_service()
        .create_from_order(order.id)
        .await
        .expect("create shipment");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/cancel", shipment.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["status"], "cancelled");
    assert!(body["data"]["cancelled_at"].is_string());
}

#[tokio::test]
async fn mark_posted_requires_a_generated_label() {
    let app = TestApp::new().await;
    let order = app.seed_paid_order().await;
    let shipment = app
        .state
        .shipment_service()
        .create_from_order(order.id)
        .await
        .expect("create shipment");

    let premature = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/mark-posted", shipment.id),
            None,
        )
        .await;
    assert_eq!(premature.status(), StatusCode::CONFLICT);

    app.state
        .label_service()
        .generate_label(shipment.id, false)
        .await
        .expect("label workflow");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/shipments/{}/mark-posted", shipment.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["status"], "posted");
    assert!(body["data"]["posted_at"].is_string());
}

#[tokio::test]
async fn list_filters_by_status_and_rejects_unknown_filters() {
    let app = TestApp::new().await;

    for _ in 0..2 {
        let order = app.seed_paid_order().await;
        app.state
            .shipment_service()
            .create_from_order(order.id)
            .await
            .expect("create shipment");
    }
    let order = app.seed_paid_order().await;
    let labelled = app
        .state
        .shipment_service()
        .create_from_order(order.id)
        .await
        .expect("create shipment");
    app.state
        .label_service()
        .generate_label(labelled.id, false)
        .await
        .expect("label workflow");

    let response = app
        .request(Method::GET, "/api/v1/shipments?status=pending", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["total"], 2);

    let response = app
        .request(Method::GET, "/api/v1/shipments?status=generated", None)
        .await;
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["total"], 1);

    let response = app
        .request(Method::GET, "/api/v1/shipments?status=teleported", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tracking_endpoint_returns_public_view() {
    let app = TestApp::new().await;
    let order = app.seed_paid_order().await;
    let shipment = app
        .state
        .shipment_service()
        .create_from_order(order.id)
        .await
        .expect("create shipment");
    let labelled = app
        .state
        .label_service()
        .generate_label(shipment.id, false)
        .await
        .expect("label workflow");

    let tracking_number = labelled.tracking_number.as_deref().unwrap();
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/tracking/{}", tracking_number),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = TestApp::json_body(response).await;
    assert_eq!(body["data"]["tracking_number"], tracking_number);
    assert_eq!(body["data"]["carrier_name"], "Correios");
    // Internal fields never leak on the public endpoint
    assert!(body["data"].get("label_url").is_none());
    assert!(body["data"].get("recipient_document").is_none());

    let response = app
        .request(Method::GET, "/api/v1/tracking/XX000000000XX", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_shipment_returns_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/shipments/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
