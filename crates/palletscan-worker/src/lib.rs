//! # Worker Runtime
//!
//! **Consumes jobs from the bus, drives the detection pipeline, and
//! persists terminal state.**
//!
//! Each worker process holds the model in a single process-wide slot
//! ([`model::ModelSlot`]) and runs one or more consumer slots, each with a
//! prefetch of one in-flight job. The job loop is in [`runner::JobRunner`]:
//! initial processing row, progress token, pipeline under the hard time
//! budget, terminal commit, transient-entry clear, late ack.

pub mod config;
pub mod error;
pub mod model;
pub mod runner;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use model::{ModelKey, ModelSlot};
pub use runner::JobRunner;
