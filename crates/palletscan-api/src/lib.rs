//! # HTTP Ingress
//!
//! **Upload validation, job dispatch, and the polling/listing query
//! surface.**
//!
//! The controller validates multipart uploads (content type, extension,
//! 10 MiB cap), persists the bytes under a UUID-named file, enqueues the
//! job on the bus, and answers result queries with a three-tier fallback:
//! the durable store first, the store's task metadata second, and the
//! bus's transient state channel last. A task that was just enqueued is
//! therefore always visible as 202 until its terminal row lands.

pub mod controller;
pub mod error;
pub mod response;
pub mod server;

pub use controller::{
    ControllerConfig, ImageController, ListQuery, TaskListResponse, UploadResponse, UploadedFile,
    MAX_UPLOAD_BYTES, SUPPORTED_EXTENSIONS,
};
pub use error::ApiError;
pub use response::format_api_response;
pub use server::{ApiConfig, HttpApiServer};
