//! # Result Store Abstractions and Implementations
//!
//! **Pluggable result storage for the palletscan job lifecycle.**
//!
//! The store holds two kinds of rows per task: a task row (status,
//! timestamps) and a result row carrying the terminal payload. A result
//! row exists iff the task's status is terminal; non-terminal writes touch
//! the task row only, which is what polling clients see as "in progress".
//!
//! ## Quick Start
//!
//! ```rust
//! use palletscan_store::{InMemoryResultStore, ResultStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), palletscan_store::StoreError> {
//! let store = InMemoryResultStore::new();
//! store.save_result("task-1", &json!({"status": "processing"})).await?;
//! store.save_result("task-1", &json!({"status": "completed", "qr_codes": []})).await?;
//! assert!(store.get_result("task-1").await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod state_machine;
pub mod traits;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;


// Re-exports for convenience
pub use error::StoreError;
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryResultStore, InMemoryStoreConfig};
pub use state_machine::{is_terminal, validate_transition};
pub use traits::ResultStore;
pub use types::{HealthStatus, StorageStats, StoreHealth, TaskMetadata, TaskStatus};

#[cfg(feature = "postgres")]
pub use postgres::{PgResultStore, PgStoreConfig};
