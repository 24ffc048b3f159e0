//! Worker error types.

use reel_media::MediaError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Vision analysis failed: {0}")]
    VisionFailed(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn vision_failed(msg: impl Into<String>) -> Self {
        Self::VisionFailed(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::VisionFailed(_) | WorkerError::Io(_) => true,
            WorkerError::Media(e) => matches!(e, MediaError::Timeout(_) | MediaError::Io(_)),
            _ => false,
        }
    }

    /// Errors that point at a defect in the planner rather than bad input.
    pub fn is_planning_bug(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_planning_bug())
    }
}
