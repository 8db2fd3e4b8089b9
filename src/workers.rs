//! Worker pool draining the fulfillment task queue.
//!
//! Workers share one receiver; each envelope is executed by exactly one
//! worker. Failures marked retryable are re-submitted after the policy's
//! backoff delay; exhausted label tasks leave a durable failure record for
//! operators.

use std::sync::Arc;

use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::message_queue::{FulfillmentTask, TaskEnvelope, TaskQueue};
use crate::models::fulfillment_failure;
use crate::services::labels::LabelService;
use crate::services::tracking::TrackingService;

/// Everything a worker needs to execute and, if necessary, retry tasks
#[derive(Clone)]
pub struct WorkerContext {
    pub db_pool: Arc<DbPool>,
    pub queue: Arc<dyn TaskQueue>,
    pub labels: Arc<LabelService>,
    pub tracking: Arc<TrackingService>,
    pub event_sender: Arc<EventSender>,
    pub clock: Arc<dyn Clock>,
}

/// Spawns `count` workers draining the given receiver. The handles finish
/// once the queue's send side is dropped and the channel drains.
pub fn spawn_workers(
    count: usize,
    receiver: mpsc::Receiver<TaskEnvelope>,
    context: WorkerContext,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    (0..count)
        .map(|worker_id| {
            let receiver = Arc::clone(&receiver);
            let context = context.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, receiver, context).await;
            })
        })
        .collect()
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TaskEnvelope>>>,
    context: WorkerContext,
) {
    info!(worker_id, "Fulfillment worker started");
    loop {
        let envelope = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };
        let Some(envelope) = envelope else {
            break;
        };
        handle_envelope(worker_id, envelope, &context).await;
    }
    info!(worker_id, "Fulfillment worker stopped");
}

#[instrument(skip(envelope, context), fields(task_id = %envelope.id, kind = envelope.task.kind(), attempt = envelope.attempt))]
async fn handle_envelope(worker_id: usize, envelope: TaskEnvelope, context: &WorkerContext) {
    let result = match &envelope.task {
        FulfillmentTask::GenerateLabel {
            shipment_id,
            notify,
        } => context
            .labels
            .generate_label(*shipment_id, *notify)
            .await
            .map(|_| ()),
        FulfillmentTask::ProcessWebhook { payload } => context
            .tracking
            .process_webhook_payload(payload.clone())
            .await
            .map(|_| ()),
    };

    let Err(error) = result else {
        debug!("Task completed");
        return;
    };

    if error.is_retryable() && envelope.retries_left() {
        let delay = envelope.policy.backoff(envelope.attempt);
        warn!(delay_secs = delay.as_secs(), "Task failed, scheduling retry: {}", error);
        let queue = Arc::clone(&context.queue);
        let retry = envelope.next_attempt();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.submit(retry).await {
                error!("Failed to re-submit task for retry: {}", e);
            }
        });
        return;
    }

    error!(attempts = envelope.attempt, "Task failed permanently: {}", error);
    record_failure(&envelope, &error, context).await;
}

/// Writes the operator-visible failure record for label tasks. Webhook
/// tasks carry no shipment attribution of their own, so exhaustion there
/// is log-only.
async fn record_failure(envelope: &TaskEnvelope, error: &ServiceError, context: &WorkerContext) {
    let FulfillmentTask::GenerateLabel { shipment_id, .. } = &envelope.task else {
        return;
    };

    let step = match error {
        ServiceError::FulfillmentFailed { step, .. } => step.to_string(),
        _ => envelope.task.kind().to_string(),
    };

    let record = fulfillment_failure::ActiveModel {
        id: Set(Uuid::new_v4()),
        shipment_id: Set(*shipment_id),
        step: Set(step.clone()),
        message: Set(error.to_string()),
        attempts: Set(envelope.attempt as i32),
        failed_at: Set(context.clock.now()),
    };

    if let Err(e) = record.insert(&*context.db_pool).await {
        error!(%shipment_id, "Failed to persist fulfillment failure record: {}", e);
    }

    let _ = context
        .event_sender
        .send(Event::FulfillmentFailed {
            shipment_id: *shipment_id,
            step,
            message: error.to_string(),
        })
        .await;
}
