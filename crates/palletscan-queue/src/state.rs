//! Per-task state channel and transient cache.
//!
//! Workers publish progress tokens here while a job is in flight; the
//! API's polling fallback reads them when the store has nothing yet. The
//! worker clears a task's entry after the terminal store write commits, so
//! stale in-flight state is never seen post-completion.

use crate::error::QueueError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Progress token for an in-flight task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Processing,
    Success,
    Failure,
}

/// State entry published on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressUpdate {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
        }
    }

    pub fn with_message(state: TaskState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: Some(message.into()),
        }
    }
}

/// Short-lived key/value channel keyed by task id.
#[async_trait]
pub trait StateChannel: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Publish (or refresh) a task's progress entry.
    async fn publish(&self, task_id: &str, update: ProgressUpdate) -> Result<(), QueueError>;

    /// Fetch a task's current progress entry, if any.
    async fn fetch(&self, task_id: &str) -> Result<Option<ProgressUpdate>, QueueError>;

    /// Remove a task's entry. Tolerates absence: returns `false` without
    /// error when there was nothing to remove.
    async fn clear_task_result(&self, task_id: &str) -> Result<bool, QueueError>;
}

/// In-memory state channel for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryStateChannel {
    entries: Arc<RwLock<HashMap<String, ProgressUpdate>>>,
}

impl InMemoryStateChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateChannel for InMemoryStateChannel {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn publish(&self, task_id: &str, update: ProgressUpdate) -> Result<(), QueueError> {
        let mut entries = self.entries.write().await;
        entries.insert(task_id.to_string(), update);
        Ok(())
    }

    async fn fetch(&self, task_id: &str) -> Result<Option<ProgressUpdate>, QueueError> {
        let entries = self.entries.read().await;
        Ok(entries.get(task_id).cloned())
    }

    async fn clear_task_result(&self, task_id: &str) -> Result<bool, QueueError> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(task_id).is_some())
    }
}
