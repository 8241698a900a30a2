//! Core bus traits: the durable job queue and its consumer side.

use crate::error::QueueError;
use crate::job::JobMessage;
use async_trait::async_trait;
use serde_json::Value;

/// Producer side of the durable work queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Human-readable name of the bus backend.
    fn backend_name(&self) -> &'static str;

    /// Enqueue a job, returning the generated task id. Synchronous from
    /// the producer's view: once this returns, the job is on the queue.
    async fn enqueue(&self, image_path: &str, metadata: Value) -> Result<String, QueueError>;

    /// Open a consumer with a prefetch of one in-flight job.
    async fn consume(&self, consumer_tag: &str) -> Result<Box<dyn JobConsumer>, QueueError>;

    /// Number of consumers currently attached to the queue. The health
    /// check treats the bus as healthy iff this is at least one.
    async fn active_consumers(&self) -> Result<u32, QueueError>;
}

/// Worker-side stream of leased jobs.
#[async_trait]
pub trait JobConsumer: Send {
    /// Wait for the next job. `None` means the consumer was cancelled and
    /// will yield nothing further.
    async fn next_job(&mut self) -> Result<Option<Box<dyn JobLease>>, QueueError>;
}

/// One leased delivery. Acknowledgment is late: workers ack only after the
/// terminal result row is committed, so a crash before that point causes a
/// redelivery.
#[async_trait]
pub trait JobLease: Send {
    fn job(&self) -> &JobMessage;

    /// Acknowledge the delivery; the job is done (successfully or with a
    /// persisted failure) and must not be redelivered.
    async fn ack(self: Box<Self>) -> Result<(), QueueError>;

    /// Return the delivery to the broker, optionally requeueing it.
    async fn reject(self: Box<Self>, requeue: bool) -> Result<(), QueueError>;
}
