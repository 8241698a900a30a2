//! Redis state channel backend.
//!
//! Entries live under `palletscan-task-meta-{task_id}` with the configured
//! result TTL, so an abandoned entry ages out on its own even if the
//! worker never clears it.

use crate::config::TASK_META_PREFIX;
use crate::error::QueueError;
use crate::state::{ProgressUpdate, StateChannel};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

/// Redis-backed state channel.
#[derive(Clone)]
pub struct RedisStateChannel {
    manager: ConnectionManager,
    ttl_secs: u64,
}

impl RedisStateChannel {
    /// Connect to Redis with auto-reconnecting connection management.
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self, QueueError> {
        info!("connecting to Redis state channel");
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::Connect(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Connect(e.to_string()))?;
        Ok(Self { manager, ttl_secs })
    }

    fn key(task_id: &str) -> String {
        format!("{TASK_META_PREFIX}{task_id}")
    }
}

#[async_trait]
impl StateChannel for RedisStateChannel {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn publish(&self, task_id: &str, update: ProgressUpdate) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&update)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::key(task_id), payload, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn fetch(&self, task_id: &str) -> Result<Option<ProgressUpdate>, QueueError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(Self::key(task_id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn clear_task_result(&self, task_id: &str) -> Result<bool, QueueError> {
        let mut conn = self.manager.clone();
        let deleted: u64 = conn.del(Self::key(task_id)).await?;
        if deleted > 0 {
            debug!(task_id, "cleared transient state entry");
        } else {
            debug!(task_id, "no transient state entry to clear");
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(
            RedisStateChannel::key("abc-123"),
            "palletscan-task-meta-abc-123"
        );
    }
}
