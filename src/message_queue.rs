/*!
 * # Fulfillment task queue
 *
 * Tasks are plain data submitted together with an explicit [`RetryPolicy`];
 * nothing about retries lives inside the task itself. The built-in backend
 * is a bounded tokio channel drained by the worker pool in
 * [`crate::workers`].
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,
}

/// Unit of work on the fulfillment queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FulfillmentTask {
    /// Run the label generation workflow for one shipment
    GenerateLabel { shipment_id: Uuid, notify: bool },

    /// Process a raw carrier webhook payload
    ProcessWebhook { payload: serde_json::Value },
}

impl FulfillmentTask {
    /// Short label for logs and failure records
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentTask::GenerateLabel { .. } => "generate_label",
            FulfillmentTask::ProcessWebhook { .. } => "process_webhook",
        }
    }
}

/// Bounded retry with increasing backoff, decided by the submitter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the given attempt (1-based). Doubles per attempt:
    /// base, 2*base, 4*base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        self.base_delay.saturating_mul(factor)
    }
}

/// Envelope carrying a task through its attempts
#[derive(Debug, Clone)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub task: FulfillmentTask,
    pub policy: RetryPolicy,
    /// 1-based attempt counter
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn new(task: FulfillmentTask, policy: RetryPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            policy,
            attempt: 1,
            enqueued_at: Utc::now(),
        }
    }

    pub fn retries_left(&self) -> bool {
        self.attempt < self.policy.max_attempts
    }

    pub fn next_attempt(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

/// Submission side of the fulfillment queue
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a fresh task with the given retry policy
    async fn enqueue(
        &self,
        task: FulfillmentTask,
        policy: RetryPolicy,
    ) -> Result<Uuid, QueueError>;

    /// Re-submit an existing envelope (used by the retry path)
    async fn submit(&self, envelope: TaskEnvelope) -> Result<(), QueueError>;
}

/// Channel-backed queue; workers drain the paired receiver
#[derive(Debug, Clone)]
pub struct ChannelTaskQueue {
    sender: mpsc::Sender<TaskEnvelope>,
}

impl ChannelTaskQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TaskEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskQueue for ChannelTaskQueue {
    async fn enqueue(
        &self,
        task: FulfillmentTask,
        policy: RetryPolicy,
    ) -> Result<Uuid, QueueError> {
        let envelope = TaskEnvelope::new(task, policy);
        let id = envelope.id;
        self.sender
            .send(envelope)
            .await
            .map_err(|_| QueueError::Closed)?;
        Ok(id)
    }

    async fn submit(&self, envelope: TaskEnvelope) -> Result<(), QueueError> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| QueueError::Closed)
    }
}
