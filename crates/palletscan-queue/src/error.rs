//! Unified error types for bus operations.

/// Unified error type for job queue and state channel operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Broker connection error: {0}")]
    Connect(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Consume error: {0}")]
    Consume(String),

    #[error("State channel error: {0}")]
    State(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}

#[cfg(feature = "rabbitmq")]
impl From<lapin::Error> for QueueError {
    fn from(err: lapin::Error) -> Self {
        QueueError::Connect(err.to_string())
    }
}

#[cfg(feature = "redis-state")]
impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        QueueError::State(err.to_string())
    }
}
