//! Error types for planning and media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during planning and media processing.
///
/// Untrusted input and degenerate images never surface here; they are
/// recovered with deterministic fallbacks. The invariant variants signal a
/// planning bug and abort the job.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Invalid target aspect: {0}")]
    InvalidAspect(String),

    #[error("Crop rectangle for {image_id} violates invariants: {detail}")]
    InvalidCrop { image_id: String, detail: String },

    #[error("Motion for shot {shot_index} is unsafe: {detail}")]
    UnsafeMotion { shot_index: usize, detail: String },

    #[error("Timeline invariant violated: {0}")]
    TimelineInvariant(String),

    #[error(
        "Rendered duration {actual:.3}s is {missing:.3}s short of {expected:.3}s, beyond the padding bound"
    )]
    DurationShortfall {
        expected: f64,
        actual: f64,
        missing: f64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid job error.
    pub fn invalid_job(detail: impl Into<String>) -> Self {
        Self::InvalidJob(detail.into())
    }

    /// Create a crop invariant error.
    pub fn invalid_crop(image_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidCrop {
            image_id: image_id.into(),
            detail: detail.into(),
        }
    }

    /// Create a motion safety error.
    pub fn unsafe_motion(shot_index: usize, detail: impl Into<String>) -> Self {
        Self::UnsafeMotion {
            shot_index,
            detail: detail.into(),
        }
    }

    /// Create a timeline invariant error.
    pub fn timeline(detail: impl Into<String>) -> Self {
        Self::TimelineInvariant(detail.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error means the planner itself produced bad output.
    pub fn is_planning_bug(&self) -> bool {
        matches!(
            self,
            Self::InvalidCrop { .. }
                | Self::UnsafeMotion { .. }
                | Self::TimelineInvariant(_)
                | Self::DurationShortfall { .. }
        )
    }
}
