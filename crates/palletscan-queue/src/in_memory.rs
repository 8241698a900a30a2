//! In-memory job queue backend.
//!
//! Suitable for tests and single-process development. Rejected deliveries
//! go back to the front of the queue, which is enough to exercise the
//! at-least-once contract.

use crate::error::QueueError;
use crate::job::JobMessage;
use crate::traits::{JobConsumer, JobLease, JobQueue};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    queue: Mutex<VecDeque<JobMessage>>,
    notify: Notify,
    consumers: AtomicU32,
}

/// In-memory job queue.
#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    inner: Arc<Inner>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently waiting (not leased).
    pub async fn depth(&self) -> usize {
        self.inner.queue.lock().await.len()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn enqueue(&self, image_path: &str, metadata: Value) -> Result<String, QueueError> {
        let task_id = Uuid::new_v4().to_string();
        let job = JobMessage::new(task_id.clone(), image_path, metadata);

        let mut queue = self.inner.queue.lock().await;
        queue.push_back(job);
        drop(queue);
        self.inner.notify.notify_one();

        Ok(task_id)
    }

    async fn consume(&self, _consumer_tag: &str) -> Result<Box<dyn JobConsumer>, QueueError> {
        self.inner.consumers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConsumer {
            inner: Arc::clone(&self.inner),
        }))
    }

    async fn active_consumers(&self) -> Result<u32, QueueError> {
        Ok(self.inner.consumers.load(Ordering::SeqCst))
    }
}

struct InMemoryConsumer {
    inner: Arc<Inner>,
}

impl Drop for InMemoryConsumer {
    fn drop(&mut self) {
        self.inner.consumers.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobConsumer for InMemoryConsumer {
    async fn next_job(&mut self) -> Result<Option<Box<dyn JobLease>>, QueueError> {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(job) = self.inner.queue.lock().await.pop_front() {
                return Ok(Some(Box::new(InMemoryLease {
                    job,
                    inner: Arc::clone(&self.inner),
                })));
            }
            notified.await;
        }
    }
}

struct InMemoryLease {
    job: JobMessage,
    inner: Arc<Inner>,
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn job(&self) -> &JobMessage {
        &self.job
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        Ok(())
    }

    async fn reject(self: Box<Self>, requeue: bool) -> Result<(), QueueError> {
        if requeue {
            let mut queue = self.inner.queue.lock().await;
            queue.push_front(self.job);
            drop(queue);
            self.inner.notify.notify_one();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_enqueue_returns_distinct_task_ids() {
        let queue = InMemoryJobQueue::new();
        let first = queue.enqueue("uploads/a.jpg", json!({})).await.unwrap();
        let second = queue.enqueue("uploads/a.jpg", json!({})).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(queue.depth().await, 2);
    }

    #[tokio::test]
    async fn test_consume_delivers_in_order() {
        let queue = InMemoryJobQueue::new();
        let first = queue.enqueue("uploads/a.jpg", json!({})).await.unwrap();
        queue.enqueue("uploads/b.jpg", json!({})).await.unwrap();

        let mut consumer = queue.consume("test").await.unwrap();
        let lease = consumer.next_job().await.unwrap().unwrap();
        assert_eq!(lease.job().task_id, first);
        lease.ack().await.unwrap();
    }

    #[tokio::test]
    async fn test_reject_with_requeue_redelivers() {
        let queue = InMemoryJobQueue::new();
        let task_id = queue.enqueue("uploads/a.jpg", json!({})).await.unwrap();

        let mut consumer = queue.consume("test").await.unwrap();
        let lease = consumer.next_job().await.unwrap().unwrap();
        lease.reject(true).await.unwrap();

        let lease = consumer.next_job().await.unwrap().unwrap();
        assert_eq!(lease.job().task_id, task_id);
        lease.ack().await.unwrap();
    }

    #[tokio::test]
    async fn test_reject_without_requeue_drops() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue("uploads/a.jpg", json!({})).await.unwrap();

        let mut consumer = queue.consume("test").await.unwrap();
        let lease = consumer.next_job().await.unwrap().unwrap();
        lease.reject(false).await.unwrap();

        let nothing = timeout(Duration::from_millis(50), consumer.next_job()).await;
        assert!(nothing.is_err(), "queue should be empty");
    }

    #[tokio::test]
    async fn test_consumer_count_tracks_attach_detach() {
        let queue = InMemoryJobQueue::new();
        assert_eq!(queue.active_consumers().await.unwrap(), 0);

        let consumer = queue.consume("test").await.unwrap();
        assert_eq!(queue.active_consumers().await.unwrap(), 1);

        drop(consumer);
        assert_eq!(queue.active_consumers().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consumer_wakes_on_late_enqueue() {
        let queue = InMemoryJobQueue::new();
        let mut consumer = queue.consume("test").await.unwrap();

        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.enqueue("uploads/late.jpg", json!({})).await.unwrap();
        });

        let lease = timeout(Duration::from_secs(1), consumer.next_job())
            .await
            .expect("consumer should wake")
            .unwrap()
            .unwrap();
        assert_eq!(lease.job().image_path, "uploads/late.jpg");
    }
}
