use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use fulfillment_api as api;

use api::carriers::{CarrierGateway, MemoryCarrier};
use api::clock::system_clock;
use api::events::EventSender;
use api::message_queue::{ChannelTaskQueue, RetryPolicy, TaskQueue};
use api::services::labels::LabelService;
use api::services::notifications::{LogNotificationDispatcher, NotificationDispatcher};
use api::services::shipments::ShipmentService;
use api::services::tracking::TrackingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
        info!("Database migrations applied");
    }
    let db = Arc::new(db_pool);

    // Carrier gateway backend
    let gateway: Arc<dyn CarrierGateway> = match cfg.carrier_backend.as_str() {
        "memory" => Arc::new(MemoryCarrier::new()),
        other => {
            error!("Unknown carrier backend '{}'", other);
            anyhow::bail!("unknown carrier backend '{}'", other);
        }
    };

    let clock = system_clock();
    let notifier: Arc<dyn NotificationDispatcher> = Arc::new(LogNotificationDispatcher);

    // Event channel and fulfillment task queue
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(1024);
    let event_sender = Arc::new(EventSender::new(event_tx));

    let (queue, task_rx) = ChannelTaskQueue::new(1024);
    let queue: Arc<dyn TaskQueue> = Arc::new(queue);

    let retry_policy = RetryPolicy::new(
        cfg.task_max_attempts,
        Duration::from_secs(cfg.task_retry_base_secs),
    );

    // Services
    let shipments = Arc::new(ShipmentService::new(
        db.clone(),
        gateway.clone(),
        event_sender.clone(),
        clock.clone(),
    ));
    let labels = Arc::new(LabelService::new(
        db.clone(),
        gateway.clone(),
        queue.clone(),
        notifier.clone(),
        event_sender.clone(),
        clock.clone(),
        retry_policy,
    ));
    let tracking = Arc::new(TrackingService::new(
        db.clone(),
        gateway.clone(),
        event_sender.clone(),
        clock.clone(),
    ));

    // Background event processor
    tokio::spawn(api::events::process_events(
        event_rx,
        shipments.clone(),
        notifier.clone(),
    ));

    // Fulfillment worker pool
    let worker_context = api::workers::WorkerContext {
        db_pool: db.clone(),
        queue: queue.clone(),
        labels: labels.clone(),
        tracking: tracking.clone(),
        event_sender: event_sender.clone(),
        clock: clock.clone(),
    };
    let _workers = api::workers::spawn_workers(cfg.fulfillment_workers, task_rx, worker_context);

    // Scheduled tracking poll
    if cfg.tracking_poll_interval_secs > 0 {
        let tracking_poll = tracking.clone();
        let interval = Duration::from_secs(cfg.tracking_poll_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it so startup stays quiet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match tracking_poll.poll_once().await {
                    Ok(count) => info!(shipments = count, "Tracking poll sweep finished"),
                    Err(e) => warn!("Tracking poll sweep failed: {}", e),
                }
            }
        });
    } else {
        info!("Tracking polling disabled by configuration");
    }

    let services = api::handlers::AppServices::new(shipments, labels, tracking);

    let app_state = api::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        queue,
        services,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        info!("Using permissive CORS (no explicit origins configured)");
        CorsLayer::permissive()
    };

    let app = api::app(app_state).layer(cors_layer);

    let addr: SocketAddr = cfg.server_addr().parse()?;
    info!("fulfillment-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
