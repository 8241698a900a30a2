//! In-memory result store backend.
//!
//! Suitable for development, testing, and single-instance deployments.
//! Rows are stored in a `HashMap` behind an `RwLock`.

use crate::error::StoreError;
use crate::state_machine;
use crate::traits::ResultStore;
use crate::types::{StorageStats, StoreHealth, TaskMetadata, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Configuration for the in-memory backend.
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Row time-to-live in seconds (0 = rows never expire).
    pub result_ttl_secs: u64,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            result_ttl_secs: 7 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredTask {
    task_id: String,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    result: Option<Value>,
}

/// In-memory result store.
#[derive(Clone, Default)]
pub struct InMemoryResultStore {
    tasks: Arc<RwLock<HashMap<String, StoredTask>>>,
    config: InMemoryStoreConfig,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    fn expiry(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (self.config.result_ttl_secs > 0)
            .then(|| created_at + Duration::seconds(self.config.result_ttl_secs as i64))
    }

    fn metadata(task: &StoredTask) -> TaskMetadata {
        TaskMetadata {
            task_id: task.task_id.clone(),
            status: task.status,
            created_at: task.created_at.to_rfc3339(),
            has_result: task.result.is_some(),
        }
    }

    fn sorted_newest_first(tasks: &HashMap<String, StoredTask>) -> Vec<&StoredTask> {
        let mut sorted: Vec<&StoredTask> = tasks.values().collect();
        sorted.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.task_id.cmp(&a.task_id))
        });
        sorted
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn save_result(&self, task_id: &str, payload: &Value) -> Result<bool, StoreError> {
        let status: TaskStatus = payload
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidStatus("missing status field".to_string()))?
            .parse()?;

        let mut tasks = self.tasks.write().await;

        if let Some(existing) = tasks.get_mut(task_id) {
            // Redelivered jobs may try to rewind or rewrite a settled row;
            // absorb anything the state machine rejects.
            if let Err(err) = state_machine::validate_transition(existing.status, status) {
                debug!(task_id, current = %existing.status, requested = %status, error = %err,
                    "absorbed invalid status overwrite");
                return Ok(false);
            }
            existing.status = status;
            if state_machine::is_terminal(status) {
                existing.result = Some(payload.clone());
            }
        } else {
            let created_at = Utc::now();
            tasks.insert(
                task_id.to_string(),
                StoredTask {
                    task_id: task_id.to_string(),
                    status,
                    created_at,
                    expires_at: self.expiry(created_at),
                    result: state_machine::is_terminal(status).then(|| payload.clone()),
                },
            );
        }

        Ok(true)
    }

    async fn get_result(&self, task_id: &str) -> Result<Option<Value>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(task_id).and_then(|t| t.result.clone()))
    }

    async fn get_task_metadata(
        &self,
        task_id: &str,
    ) -> Result<Option<TaskMetadata>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(task_id).map(Self::metadata))
    }

    async fn list_all_results(&self, limit: u32) -> Result<Vec<TaskMetadata>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(Self::sorted_newest_first(&tasks)
            .into_iter()
            .take(limit as usize)
            .map(Self::metadata)
            .collect())
    }

    async fn list_results_by_status(
        &self,
        status: TaskStatus,
        limit: u32,
    ) -> Result<Vec<TaskMetadata>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(Self::sorted_newest_first(&tasks)
            .into_iter()
            .filter(|t| t.status == status)
            .take(limit as usize)
            .map(Self::metadata)
            .collect())
    }

    async fn list_results_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<TaskMetadata>, StoreError> {
        let tasks = self.tasks.read().await;
        Ok(Self::sorted_newest_first(&tasks)
            .into_iter()
            .filter(|t| t.created_at >= start && t.created_at <= end)
            .take(limit as usize)
            .map(Self::metadata)
            .collect())
    }

    async fn delete_result(&self, task_id: &str) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks.remove(task_id).is_some())
    }

    async fn get_storage_stats(&self) -> Result<StorageStats, StoreError> {
        let tasks = self.tasks.read().await;
        let mut status_counts: HashMap<String, u64> = HashMap::new();
        for task in tasks.values() {
            *status_counts.entry(task.status.to_string()).or_insert(0) += 1;
        }
        Ok(StorageStats {
            total_tasks: tasks.len() as u64,
            status_counts,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    async fn health_check(&self) -> StoreHealth {
        StoreHealth::healthy()
    }

    async fn sweep_expired(&self) -> Result<u64, StoreError> {
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let before = tasks.len();
        tasks.retain(|_, task| task.expires_at.is_none_or(|expiry| expiry > now));
        Ok((before - tasks.len()) as u64)
    }
}
