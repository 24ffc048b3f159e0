//! Photo reel planning worker.
//!
//! This crate provides:
//! - Job file loading with planner overrides
//! - Serialized vision calls with neutral fallbacks
//! - Planning and filter-graph output
//! - Optional FFmpeg render with the duration safety net

pub mod config;
pub mod error;
pub mod logging;
pub mod processor;
pub mod vision;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use processor::{JobFile, JobProcessor, PlanOutput, RenderedReel};
pub use vision::{analyze_sequentially, GeminiVisionClient, VisionAnalyzer, VisionImage};
