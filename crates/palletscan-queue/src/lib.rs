//! # Message Bus Abstractions and Implementations
//!
//! **Durable job queue plus the per-task state channel shared between the
//! API producer and the worker fleet.**
//!
//! Delivery is at-least-once: the worker acknowledges a job only after the
//! terminal result row is committed, and the store's idempotent upsert
//! absorbs any redelivery that races a crash. Prefetch is fixed at one job
//! per worker slot so saturated workers exert backpressure instead of
//! hoarding.
//!
//! The state channel doubles as the transient cache: workers publish
//! `PENDING`/`PROCESSING`/`SUCCESS`/`FAILURE` tokens there, the API's
//! polling fallback reads them, and the worker clears a task's entry once
//! the durable write lands.

pub mod config;
pub mod error;
#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod job;
pub mod state;
pub mod traits;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;
#[cfg(feature = "redis-state")]
pub mod redis_state;

// Re-exports for convenience
pub use config::{BusConfig, PROCESS_QUEUE, TASK_META_PREFIX};
pub use error::QueueError;
#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryJobQueue;
pub use job::JobMessage;
pub use state::{InMemoryStateChannel, ProgressUpdate, StateChannel, TaskState};
pub use traits::{JobConsumer, JobLease, JobQueue};

#[cfg(feature = "rabbitmq")]
pub use rabbitmq::RabbitJobQueue;
#[cfg(feature = "redis-state")]
pub use redis_state::RedisStateChannel;
