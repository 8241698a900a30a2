//! Unified error type for pipeline operations.

/// Errors that can abort a pipeline run.
///
/// Only `ImageNotFound`, `ImageDecode` and `Detection` abort processing;
/// per-crop decode failures are absorbed as sentinel content and never
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The source image path does not exist or could not be opened.
    #[error("Imagem não encontrada: {0}")]
    ImageNotFound(String),

    /// The image bytes could not be decoded into a pixel buffer.
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// The object detector failed to produce detections.
    #[error("Detection failed: {0}")]
    Detection(String),

    /// The model manifest could not be read or parsed.
    #[error("Invalid model manifest: {0}")]
    InvalidModel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::ImageDecode(err.to_string())
    }
}
