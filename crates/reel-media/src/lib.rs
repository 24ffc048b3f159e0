#![deny(unreachable_patterns)]
//! Composition planning and FFmpeg plumbing for photo reels.
//!
//! This crate provides:
//! - Deterministic composition planning (saliency crops, story lock, motion,
//!   transitions, timeline)
//! - Type-safe FFmpeg command building with timeout and cancellation
//! - A filter-graph builder that renders a plan from still inputs
//! - A duration safety net that re-measures and pads rendered output

pub mod command;
pub mod composition;
pub mod duration_guard;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod probe;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use composition::{
    CompositionPlan, CompositionPlanner, ImageSource, PlanRequest, PlannerConfig, PlannerImage,
};
pub use duration_guard::{assess_duration, ensure_duration, pad_to_duration, DurationVerdict};
pub use error::{MediaError, MediaResult};
pub use filters::{build_render_graph, RenderGraph, RenderInput};
pub use probe::{probe_duration, probe_video, VideoInfo};
