//! Job message carried on the work queue.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The in-flight representation of a task on the bus.
///
/// `metadata` is the free-form key/value map captured at upload (original
/// filename, content type, size, and an optional `config` record of
/// per-task processing overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub task_id: String,
    pub image_path: String,
    #[serde(default)]
    pub metadata: Value,
}

impl JobMessage {
    pub fn new(task_id: impl Into<String>, image_path: impl Into<String>, metadata: Value) -> Self {
        Self {
            task_id: task_id.into(),
            image_path: image_path.into(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serde_round_trip() {
        let job = JobMessage::new(
            "abc-123",
            "uploads/abc-123.jpg",
            json!({"original_filename": "pallet.jpg", "file_size": 1024}),
        );
        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: JobMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.task_id, "abc-123");
        assert_eq!(decoded.metadata["file_size"], 1024);
    }

    #[test]
    fn test_metadata_defaults_to_null() {
        let decoded: JobMessage =
            serde_json::from_str(r#"{"task_id": "t", "image_path": "p"}"#).unwrap();
        assert!(decoded.metadata.is_null());
    }
}
