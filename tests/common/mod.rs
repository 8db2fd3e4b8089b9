use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use fulfillment_api::{
    carriers::{CarrierGateway, MemoryCarrier},
    clock::{Clock, FixedClock},
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    message_queue::{ChannelTaskQueue, RetryPolicy, TaskEnvelope, TaskQueue},
    models::{order, PaymentStatus},
    services::labels::LabelService,
    services::notifications::{LogNotificationDispatcher, NotificationDispatcher},
    services::shipments::ShipmentService,
    services::tracking::TrackingService,
    AppState,
};

/// Test harness: application state over a fresh file-backed SQLite database
/// plus direct handles on the services, the in-memory carrier and the task
/// queue receiver. Workers are not spawned; tests drain the queue
/// themselves when they need to observe scheduling.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub carrier: Arc<MemoryCarrier>,
    pub clock: Arc<FixedClock>,
    pub task_rx: mpsc::Receiver<TaskEnvelope>,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let carrier = Arc::new(MemoryCarrier::new());
        Self::with_gateway_arc(carrier.clone(), carrier).await
    }

    /// Build the harness around an arbitrary gateway (e.g. a mock). The
    /// `carrier` handle still points at a MemoryCarrier for tests that
    /// script tracking data; ignore it when a mock gateway is injected.
    pub async fn with_gateway(gateway: Arc<dyn CarrierGateway>) -> Self {
        Self::with_gateway_arc(Arc::new(MemoryCarrier::new()), gateway).await
    }

    async fn with_gateway_arc(carrier: Arc<MemoryCarrier>, gateway: Arc<dyn CarrierGateway>) -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir for test db");
        let db_path = tmp.path().join("fulfillment_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let clock = Arc::new(FixedClock::new(Utc::now()));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let notifier: Arc<dyn NotificationDispatcher> = Arc::new(LogNotificationDispatcher);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));

        let (queue, task_rx) = ChannelTaskQueue::new(64);
        let queue: Arc<dyn TaskQueue> = Arc::new(queue);

        let shipments = Arc::new(ShipmentService::new(
            db_arc.clone(),
            gateway.clone(),
            event_sender.clone(),
            clock_dyn.clone(),
        ));
        let labels = Arc::new(LabelService::new(
            db_arc.clone(),
            gateway.clone(),
            queue.clone(),
            notifier.clone(),
            event_sender.clone(),
            clock_dyn.clone(),
            RetryPolicy::new(3, Duration::from_millis(10)),
        ));
        let tracking = Arc::new(TrackingService::new(
            db_arc.clone(),
            gateway,
            event_sender.clone(),
            clock_dyn,
        ));

        let event_task = tokio::spawn(events::process_events(
            event_rx,
            shipments.clone(),
            notifier,
        ));

        let services = AppServices::new(shipments, labels, tracking);
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            queue,
            services,
        };

        let router = fulfillment_api::app(state.clone());

        Self {
            router,
            state,
            carrier,
            clock,
            task_rx,
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Decode a JSON response body.
    pub async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    }

    /// Insert a paid order ready for fulfillment.
    pub async fn seed_paid_order(&self) -> order::Model {
        self.seed_order(PaymentStatus::Paid).await
    }

    pub async fn seed_order(&self, payment_status: PaymentStatus) -> order::Model {
        let now = self.clock.now();
        let id = Uuid::new_v4();
        let active = order::ActiveModel {
            id: Set(id),
            order_number: Set(format!("ORD-{}", &id.simple().to_string()[..8])),
            payment_status: Set(payment_status),
            total_amount: Set(dec!(149.90)),
            currency: Set("BRL".to_string()),
            customer_name: Set("Maria Silva".to_string()),
            customer_document: Set(Some("123.456.789-00".to_string())),
            customer_phone: Set(Some("+55 11 98765-4321".to_string())),
            customer_email: Set(Some("maria@example.com".to_string())),
            address_line1: Set("Rua das Flores 123".to_string()),
            address_line2: Set(Some("Apto 45".to_string())),
            city: Set("Sao Paulo".to_string()),
            state: Set("SP".to_string()),
            postal_code: Set("01310-100".to_string()),
            country: Set("BR".to_string()),
            carrier_name: Set("Correios".to_string()),
            service_code: Set("03220".to_string()),
            service_name: Set("SEDEX".to_string()),
            shipping_cost: Set(dec!(24.90)),
            insurance_cost: Set(dec!(1.50)),
            weight_kg: Set(dec!(1.250)),
            dimensions_cm: Set(Some("30x20x10".to_string())),
            delivery_min_days: Set(2),
            delivery_max_days: Set(5),
            created_at: Set(now),
            updated_at: Set(now),
        };
        active
            .insert(&*self.state.db)
            .await
            .expect("seed order insert")
    }
}
