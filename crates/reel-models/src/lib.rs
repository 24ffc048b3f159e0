//! Shared data models for the Reelsmith composition planner.
//!
//! This crate provides Serde-serializable types for:
//! - Image attributes returned by the vision collaborator
//! - Target aspect ratios, crop rectangles and saliency plans
//! - Shots, narrative beats and the story lock
//! - Motion specs and transitions
//! - The encoder-facing timeline
//! - Plan jobs

pub mod aspect;
pub mod image;
pub mod job;
pub mod motion;
pub mod rect;
pub mod saliency;
pub mod shot;
pub mod story;
pub mod timeline;
pub mod transition;

// Re-export common types
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use image::{EmotionVector, ImageAttributes, Orientation, Rotation, VisionReply};
pub use job::{JobId, PlanImage, PlanJob, Seed};
pub use motion::{Easing, MotionNoise, MotionPack, MotionPreset, MotionSpec};
pub use rect::CropRect;
pub use saliency::{Anchor, SaliencyPlan};
pub use shot::{Beat, NarrativePurpose, Shot, ShotRole, VocabularyParseError};
pub use story::{OrderingRejection, StoryLock};
pub use timeline::{Timeline, TimelineSegment};
pub use transition::{Transition, TransitionKind, TransitionReason};
