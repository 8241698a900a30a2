//! Core result store trait.

use crate::error::StoreError;
use crate::types::{StorageStats, StoreHealth, TaskMetadata, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Durable storage of task metadata and terminal result payloads.
///
/// Implementations must be `Send + Sync` for use across async contexts.
/// `save_result` is the single write entry point: it upserts the task row
/// (status taken from the payload's `status` field) and the result row in
/// one transaction, and is idempotent on `task_id`.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Human-readable name of the storage backend (e.g., "in-memory").
    fn backend_name(&self) -> &'static str;

    /// Upsert the task and result rows for `task_id` from `payload`.
    ///
    /// Status changes are gated by the task state machine: a write that
    /// would rewind a row or rewrite a terminal one (result rows are
    /// immutable) is absorbed as a successful no-op, which is what makes
    /// redelivered jobs harmless. Returns `false` only when the write was
    /// skipped that way.
    async fn save_result(&self, task_id: &str, payload: &Value) -> Result<bool, StoreError>;

    /// Fetch the stored result payload verbatim.
    async fn get_result(&self, task_id: &str) -> Result<Option<Value>, StoreError>;

    /// Fetch task-level metadata without the payload.
    async fn get_task_metadata(&self, task_id: &str)
    -> Result<Option<TaskMetadata>, StoreError>;

    /// List task metadata, newest `created_at` first.
    async fn list_all_results(&self, limit: u32) -> Result<Vec<TaskMetadata>, StoreError>;

    /// Same shape as `list_all_results`, filtered by exact status.
    async fn list_results_by_status(
        &self,
        status: TaskStatus,
        limit: u32,
    ) -> Result<Vec<TaskMetadata>, StoreError>;

    /// Same shape, filtered by `created_at ∈ [start, end]`.
    async fn list_results_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<TaskMetadata>, StoreError>;

    /// Remove the result and task rows atomically. Returns `true` if a
    /// task row was removed.
    async fn delete_result(&self, task_id: &str) -> Result<bool, StoreError>;

    /// Aggregate counts by status.
    async fn get_storage_stats(&self) -> Result<StorageStats, StoreError>;

    /// Probe backend connectivity. Never errors; degraded backends report
    /// through the health struct.
    async fn health_check(&self) -> StoreHealth;

    /// Delete rows whose `expires_at` has passed. Returns the number of
    /// tasks removed.
    async fn sweep_expired(&self) -> Result<u64, StoreError>;
}
