//! Upload, query and health logic behind the HTTP surface.

use crate::error::ApiError;
use crate::response::format_api_response;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use palletscan_queue::{JobQueue, ProgressUpdate, StateChannel, TaskState};
use palletscan_store::{HealthStatus, ResultStore, StorageStats, TaskMetadata, TaskStatus};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Extensions accepted at upload.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".tif"];

/// Upload size cap: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Filesystem and pagination knobs for the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub uploads_dir: PathBuf,
    pub qr_crops_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
            qr_crops_dir: PathBuf::from("qr_crops"),
            outputs_dir: PathBuf::from("outputs"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

/// One multipart `file` field, fully drained.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskMetadata>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Listing query parameters after parsing.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub status: Option<TaskStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// The ingress controller: validates uploads, dispatches jobs, and answers
/// polling/listing queries by consulting the store first, then the state
/// channel.
pub struct ImageController {
    store: Arc<dyn ResultStore>,
    queue: Arc<dyn JobQueue>,
    states: Arc<dyn StateChannel>,
    config: ControllerConfig,
}

impl ImageController {
    pub fn new(
        store: Arc<dyn ResultStore>,
        queue: Arc<dyn JobQueue>,
        states: Arc<dyn StateChannel>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            states,
            config,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    /// Validate an upload, persist the bytes, and enqueue the job.
    pub async fn upload_and_process(
        &self,
        file: UploadedFile,
    ) -> Result<UploadResponse, ApiError> {
        if !file.content_type.starts_with("image/") {
            return Err(ApiError::Validation(
                "Arquivo deve ser uma imagem válida".to_string(),
            ));
        }

        let extension = Path::new(&file.filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ApiError::Validation(format!(
                "Extensão não suportada. Extensões permitidas: {SUPPORTED_EXTENSIONS:?}"
            )));
        }

        if file.data.is_empty() {
            return Err(ApiError::Validation("Arquivo vazio".to_string()));
        }
        if file.data.len() > self.config.max_upload_bytes {
            return Err(ApiError::TooLarge(format!(
                "Arquivo muito grande. Tamanho máximo: {}MB",
                self.config.max_upload_bytes / (1024 * 1024)
            )));
        }

        tokio::fs::create_dir_all(&self.config.uploads_dir)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let stored_name = format!("{}{extension}", Uuid::new_v4());
        let stored_path = self.config.uploads_dir.join(&stored_name);
        tokio::fs::write(&stored_path, &file.data)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let metadata = json!({
            "original_filename": file.filename,
            "uploaded_at": Utc::now().to_rfc3339(),
            "file_size": file.data.len(),
            "content_type": file.content_type,
        });

        let task_id = self
            .queue
            .enqueue(&stored_path.display().to_string(), metadata)
            .await?;

        // Seed the state channel so polling resolves to 202 before the
        // worker writes its first row.
        if let Err(err) = self
            .states
            .publish(&task_id, ProgressUpdate::new(TaskState::Pending))
            .await
        {
            warn!(task_id, error = %err, "failed to seed pending state");
        }

        info!(task_id, filename = %file.filename, size = file.data.len(), "upload accepted");
        Ok(UploadResponse {
            task_id: task_id.clone(),
            status: "pending".to_string(),
            message: format!(
                "Imagem enviada para processamento. Use o task_id {task_id} para acompanhar o progresso."
            ),
        })
    }

    /// Three-tier result lookup: store result → store task metadata →
    /// bus state channel.
    pub async fn get_result(&self, task_id: &str) -> Result<Value, ApiError> {
        if let Some(payload) = self.store.get_result(task_id).await? {
            return Ok(format_api_response(&payload));
        }

        if let Some(metadata) = self.store.get_task_metadata(task_id).await? {
            return match metadata.status {
                TaskStatus::Processing => Err(ApiError::InProgress(
                    "Task em processamento. Aguarde a conclusão.".to_string(),
                )),
                // Terminal status without a result row is an invariant
                // violation; surface it as absence.
                _ => Err(ApiError::NotFound("Resultado não encontrado".to_string())),
            };
        }

        match self.states.fetch(task_id).await? {
            Some(update)
                if matches!(update.state, TaskState::Pending | TaskState::Processing) =>
            {
                Err(ApiError::InProgress(
                    "Task ainda está sendo processada. Aguarde a conclusão.".to_string(),
                ))
            }
            _ => Err(ApiError::NotFound("Task não encontrada".to_string())),
        }
    }

    /// Paged listing, optionally filtered by status and/or period.
    pub async fn list_results(&self, query: ListQuery) -> Result<TaskListResponse, ApiError> {
        let page = query.page.max(1);
        let period = match (query.start_date, query.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        };
        // Period queries allow a deeper window than plain listings.
        let limit = if period.is_some() {
            query.limit.clamp(1, 1000)
        } else {
            query.limit.clamp(1, 100)
        };

        let (tasks, total) = match period {
            Some((start, end)) => {
                let mut tasks = self.store.list_results_by_period(start, end, 1000).await?;
                if let Some(status) = query.status {
                    tasks.retain(|t| t.status == status);
                }
                let total = tasks.len() as u64;
                (tasks, total)
            }
            None => {
                let fetch_depth = limit.saturating_mul(page);
                let tasks = match query.status {
                    Some(status) => {
                        self.store.list_results_by_status(status, fetch_depth).await?
                    }
                    None => self.store.list_all_results(fetch_depth).await?,
                };
                let stats = self.store.get_storage_stats().await?;
                let total = match query.status {
                    Some(status) => stats
                        .status_counts
                        .get(status.as_str())
                        .copied()
                        .unwrap_or(0),
                    None => stats.total_tasks,
                };
                (tasks, total)
            }
        };

        let start_idx = ((page - 1) * limit) as usize;
        let page_tasks: Vec<TaskMetadata> = tasks
            .into_iter()
            .skip(start_idx)
            .take(limit as usize)
            .collect();

        Ok(TaskListResponse {
            tasks: page_tasks,
            total,
            page,
            limit,
        })
    }

    /// Remove a stored result (and its task row).
    pub async fn delete_result(&self, task_id: &str) -> Result<Value, ApiError> {
        if !self.store.delete_result(task_id).await? {
            return Err(ApiError::NotFound(
                "Resultado não encontrado ou erro ao remover".to_string(),
            ));
        }
        Ok(json!({"message": format!("Resultado {task_id} removido com sucesso")}))
    }

    pub async fn get_storage_stats(&self) -> Result<StorageStats, ApiError> {
        Ok(self.store.get_storage_stats().await?)
    }

    /// Aggregate health across the store, the bus, and the data
    /// directories. Healthy iff all three legs are healthy.
    pub async fn health_check(&self) -> Value {
        let database = self.store.health_check().await;
        let database_healthy = database.status == HealthStatus::Healthy;

        let (queue_healthy, active_workers, queue_error) =
            match self.queue.active_consumers().await {
                Ok(consumers) => (consumers >= 1, consumers, None),
                Err(err) => (false, 0, Some(err.to_string())),
            };

        let directories = json!({
            "uploads_dir": self.config.uploads_dir.exists(),
            "qr_crops_dir": self.config.qr_crops_dir.exists(),
            "outputs_dir": self.config.outputs_dir.exists(),
        });
        let directories_healthy = directories
            .as_object()
            .is_some_and(|dirs| dirs.values().all(|v| v.as_bool() == Some(true)));

        let overall = database_healthy && queue_healthy && directories_healthy;

        let mut queue_leg = json!({
            "status": if queue_healthy { "healthy" } else { "unhealthy" },
            "worker_count": active_workers,
        });
        if let (Some(error), Value::Object(map)) = (queue_error, &mut queue_leg) {
            map.insert("error".to_string(), json!(error));
        }

        json!({
            "status": if overall { "healthy" } else { "unhealthy" },
            "timestamp": Utc::now().to_rfc3339(),
            "components": {
                "database": database,
                "queue": queue_leg,
                "directories": directories,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palletscan_queue::{InMemoryJobQueue, InMemoryStateChannel};
    use palletscan_store::InMemoryResultStore;
    use tempfile::TempDir;

    struct Harness {
        controller: ImageController,
        store: Arc<InMemoryResultStore>,
        queue: InMemoryJobQueue,
        states: Arc<InMemoryStateChannel>,
        dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryResultStore::new());
        let queue = InMemoryJobQueue::new();
        let states = Arc::new(InMemoryStateChannel::new());
        let config = ControllerConfig {
            uploads_dir: dir.path().join("uploads"),
            qr_crops_dir: dir.path().join("qr_crops"),
            outputs_dir: dir.path().join("outputs"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        };
        let controller = ImageController::new(
            store.clone(),
            Arc::new(queue.clone()),
            states.clone(),
            config,
        );
        Harness {
            controller,
            store,
            queue,
            states,
            dir,
        }
    }

    fn png_upload(filename: &str) -> UploadedFile {
        UploadedFile {
            filename: filename.to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"\x89PNG fake bytes"),
        }
    }

    #[tokio::test]
    async fn test_upload_accepts_and_enqueues() {
        let h = harness();
        let response = h
            .controller
            .upload_and_process(png_upload("pallet.png"))
            .await
            .unwrap();

        assert_eq!(response.status, "pending");
        assert!(response.message.contains(&response.task_id));
        assert_eq!(h.queue.depth().await, 1);

        // Pending token seeded for the polling fallback.
        let state = h.states.fetch(&response.task_id).await.unwrap().unwrap();
        assert_eq!(state.state, TaskState::Pending);

        // Bytes landed under a UUID-named file with the original extension.
        let uploads = std::fs::read_dir(h.dir.path().join("uploads")).unwrap();
        let entries: Vec<_> = uploads.collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        assert!(name.to_string_lossy().ends_with(".png"));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image_content_type() {
        let h = harness();
        let err = h
            .controller
            .upload_and_process(UploadedFile {
                content_type: "application/pdf".to_string(),
                ..png_upload("doc.png")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_extension() {
        let h = harness();
        let err = h
            .controller
            .upload_and_process(png_upload("animation.gif"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let h = harness();
        let err = h
            .controller
            .upload_and_process(UploadedFile {
                data: Bytes::new(),
                ..png_upload("empty.png")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file() {
        let h = harness();
        let err = h
            .controller
            .upload_and_process(UploadedFile {
                data: Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]),
                ..png_upload("big.png")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::TooLarge(_)));
    }

    #[tokio::test]
    async fn test_get_result_formats_terminal_payload() {
        let h = harness();
        h.store
            .save_result(
                "task-1",
                &json!({
                    "status": "completed",
                    "scan_metadata": {"timestamp": "t", "image_resolution": "320x240",
                                      "processing_time_ms": 10, "image_source": "x",
                                      "preprocessing": {}},
                    "detected_objects": [],
                    "qr_codes": [],
                    "summary": {"total_detections": 0},
                }),
            )
            .await
            .unwrap();

        let result = h.controller.get_result("task-1").await.unwrap();
        assert!(result.get("summary").is_none());
        assert_eq!(
            result.pointer("/scan_metadata/image_resolution").unwrap(),
            "320x240"
        );
    }

    #[tokio::test]
    async fn test_get_result_tiers() {
        let h = harness();

        // Tier 2: task row in processing, no result row.
        h.store
            .save_result("task-wip", &json!({"status": "processing"}))
            .await
            .unwrap();
        assert!(matches!(
            h.controller.get_result("task-wip").await.unwrap_err(),
            ApiError::InProgress(_)
        ));

        // Tier 3: nothing in the store, pending token on the channel.
        h.states
            .publish("task-fresh", ProgressUpdate::new(TaskState::Pending))
            .await
            .unwrap();
        assert!(matches!(
            h.controller.get_result("task-fresh").await.unwrap_err(),
            ApiError::InProgress(_)
        ));

        // Unknown everywhere.
        assert!(matches!(
            h.controller.get_result("task-unknown").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_listing_pagination() {
        let h = harness();
        for n in 0..10 {
            h.store
                .save_result(&format!("task-{n}"), &json!({"status": "processing"}))
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let page = h
            .controller
            .list_results(ListQuery {
                page: 2,
                limit: 3,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.tasks.len(), 3);
        // Page 2 of newest-first: the 4th most recent task.
        assert_eq!(page.tasks[0].task_id, "task-6");
        assert_eq!(page.total, 10);
        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 3);
    }

    #[tokio::test]
    async fn test_listing_by_status() {
        let h = harness();
        h.store
            .save_result("task-done", &json!({"status": "completed"}))
            .await
            .unwrap();
        h.store
            .save_result("task-wip", &json!({"status": "processing"}))
            .await
            .unwrap();

        let page = h
            .controller
            .list_results(ListQuery {
                page: 1,
                limit: 50,
                status: Some(TaskStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.tasks[0].task_id, "task-done");
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_listing_by_period() {
        let h = harness();
        let before = Utc::now();
        h.store
            .save_result("task-1", &json!({"status": "processing"}))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        h.store
            .save_result("task-2", &json!({"status": "processing"}))
            .await
            .unwrap();
        let mid = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        h.store
            .save_result("task-3", &json!({"status": "processing"}))
            .await
            .unwrap();

        let page = h
            .controller
            .list_results(ListQuery {
                page: 1,
                limit: 100,
                start_date: Some(before),
                end_date: Some(mid),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(page.tasks.len(), 2);
        assert!(page.tasks.iter().all(|t| t.task_id != "task-3"));
    }

    #[tokio::test]
    async fn test_delete_result() {
        let h = harness();
        h.store
            .save_result("task-1", &json!({"status": "completed"}))
            .await
            .unwrap();

        let message = h.controller.delete_result("task-1").await.unwrap();
        assert!(message["message"].as_str().unwrap().contains("task-1"));
        assert!(matches!(
            h.controller.delete_result("task-1").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_health_requires_all_legs() {
        let h = harness();

        // No consumers, no directories yet.
        let health = h.controller.health_check().await;
        assert_eq!(health["status"], "unhealthy");

        // Attach a worker and create the directories.
        let _consumer = h.queue.consume("probe").await.unwrap();
        for dir in ["uploads", "qr_crops", "outputs"] {
            std::fs::create_dir_all(h.dir.path().join(dir)).unwrap();
        }

        let health = h.controller.health_check().await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["components"]["queue"]["worker_count"], 1);
        assert_eq!(health["components"]["database"]["status"], "healthy");
    }
}
