//! The worker job loop.
//!
//! One lease at a time per slot: write the initial processing row, emit a
//! progress token, drive the pipeline under the hard time budget, commit
//! the terminal row, clear the transient entry, then acknowledge. The ack
//! is late on purpose: a crash anywhere before the terminal commit causes
//! a redelivery, which the store's idempotent upsert absorbs.

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::model::{ModelKey, ModelSlot};
use chrono::Utc;
use palletscan_pipeline::{
    ImageSource, ProcessOptions, ProcessorOverrides, RqrrDecoder, ScanResult, VisionProcessor,
};
use palletscan_queue::{
    JobLease, JobMessage, JobQueue, ProgressUpdate, StateChannel, TaskState,
};
use palletscan_store::ResultStore;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Drives the job lifecycle for one worker process.
pub struct JobRunner {
    store: Arc<dyn ResultStore>,
    states: Arc<dyn StateChannel>,
    model_slot: Arc<ModelSlot>,
    config: WorkerConfig,
    time_limit: Duration,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn ResultStore>,
        states: Arc<dyn StateChannel>,
        model_slot: Arc<ModelSlot>,
        config: WorkerConfig,
        time_limit: Duration,
    ) -> Self {
        Self {
            store,
            states,
            model_slot,
            config,
            time_limit,
        }
    }

    /// Consume jobs until the queue closes.
    pub async fn run(&self, queue: Arc<dyn JobQueue>, slot: usize) -> Result<(), WorkerError> {
        let tag = format!("palletscan-worker-{slot}");
        let mut consumer = queue.consume(&tag).await?;
        info!(slot, "worker slot consuming");

        while let Some(lease) = consumer.next_job().await? {
            self.handle_lease(lease).await;
        }

        info!(slot, "consumer cancelled, slot exiting");
        Ok(())
    }

    /// Process one leased job and settle the delivery.
    pub async fn handle_lease(&self, lease: Box<dyn JobLease>) {
        let job = lease.job().clone();
        match self.process_job(&job).await {
            Ok(_) => {
                if let Err(err) = lease.ack().await {
                    error!(task_id = %job.task_id, error = %err, "failed to ack delivery");
                }
            }
            Err(err) => {
                // The terminal row never landed; let at-least-once retry.
                error!(task_id = %job.task_id, error = %err,
                    "terminal write failed, requeueing delivery");
                if let Err(err) = lease.reject(true).await {
                    error!(task_id = %job.task_id, error = %err, "failed to requeue delivery");
                }
            }
        }
    }

    /// Run one job to a terminal state.
    ///
    /// Returns `Err` only when the store rejected a write; every pipeline
    /// failure is converted into a persisted failure payload.
    async fn process_job(&self, job: &JobMessage) -> Result<TaskState, WorkerError> {
        let task_id = job.task_id.as_str();
        info!(task_id, image_path = %job.image_path, "processing job");

        let initial = json!({
            "status": "processing",
            "task_info": {
                "task_id": task_id,
                "image_path": job.image_path,
                "started_at": Utc::now().to_rfc3339(),
                "metadata": job.metadata,
            }
        });
        self.store.save_result(task_id, &initial).await?;

        self.publish_state(
            task_id,
            ProgressUpdate::with_message(TaskState::Processing, "Processando imagem..."),
        )
        .await;

        match self.run_pipeline(job).await {
            Ok(scan) => {
                let mut payload = serde_json::to_value(&scan)?;
                if let Value::Object(map) = &mut payload {
                    map.insert("status".to_string(), json!("completed"));
                    map.insert("task_info".to_string(), self.task_info(job));
                }
                self.store.save_result(task_id, &payload).await?;
                self.clear_state(task_id).await;
                self.publish_state(task_id, ProgressUpdate::new(TaskState::Success))
                    .await;
                info!(task_id, "job completed");
                Ok(TaskState::Success)
            }
            Err(message) => {
                let error_msg =
                    format!("Erro no processamento da imagem {}: {message}", job.image_path);
                error!(task_id, error = %error_msg, "job failed");

                let payload = json!({
                    "task_info": self.task_info(job),
                    "status": "failed",
                    "error": error_msg,
                });
                self.store.save_result(task_id, &payload).await?;
                self.clear_state(task_id).await;
                self.publish_state(
                    task_id,
                    ProgressUpdate::with_message(TaskState::Failure, error_msg),
                )
                .await;
                Ok(TaskState::Failure)
            }
        }
    }

    /// Stages 4–6 of the loop: validate the path, merge per-task config,
    /// and drive the pipeline on the blocking pool under the time budget.
    async fn run_pipeline(&self, job: &JobMessage) -> Result<ScanResult, String> {
        let image_path = Path::new(&job.image_path);
        if !image_path.exists() {
            return Err(format!("Imagem não encontrada: {}", job.image_path));
        }

        let overrides = match job.metadata.get("config") {
            Some(raw) => match serde_json::from_value::<ProcessorOverrides>(raw.clone()) {
                Ok(overrides) => overrides,
                Err(err) => {
                    warn!(task_id = %job.task_id, error = %err,
                        "ignoring malformed per-task config");
                    ProcessorOverrides::default()
                }
            },
            None => ProcessorOverrides::default(),
        };
        let merged = self.config.processor.merged(&overrides);

        let detector = self
            .model_slot
            .get_or_load(ModelKey {
                model_path: self.config.model_path.clone(),
                confidence_threshold: merged.confidence_threshold,
            })
            .await
            .map_err(|err| err.to_string())?;

        let opts = ProcessOptions {
            save_qr_crops: merged.save_crops,
            remove_source_file: true,
        };
        let processor = VisionProcessor::new(merged, detector, Arc::new(RqrrDecoder::new()));
        let path = image_path.to_path_buf();

        let handle =
            tokio::task::spawn_blocking(move || processor.process_image(ImageSource::Path(path), &opts));

        match tokio::time::timeout(self.time_limit, handle).await {
            Ok(Ok(Ok(scan))) => Ok(scan),
            Ok(Ok(Err(err))) => Err(err.to_string()),
            Ok(Err(join_err)) => Err(format!("pipeline task panicked: {join_err}")),
            Err(_) => Err(format!(
                "tempo limite de processamento excedido ({} s)",
                self.time_limit.as_secs()
            )),
        }
    }

    fn task_info(&self, job: &JobMessage) -> Value {
        json!({
            "task_id": job.task_id,
            "image_path": job.image_path,
            "processed_at": Utc::now().to_rfc3339(),
            "metadata": job.metadata,
        })
    }

    // State channel failures are logged and swallowed: the durable write
    // already happened (or is about to be retried by the bus).
    async fn publish_state(&self, task_id: &str, update: ProgressUpdate) {
        if let Err(err) = self.states.publish(task_id, update).await {
            warn!(task_id, error = %err, "failed to publish progress token");
        }
    }

    async fn clear_state(&self, task_id: &str) {
        if let Err(err) = self.states.clear_task_result(task_id).await {
            warn!(task_id, error = %err, "failed to clear transient entry");
        }
    }
}
