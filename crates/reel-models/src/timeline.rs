//! Encoder-facing timeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::transition::Transition;

/// One shot placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineSegment {
    /// Source image id
    pub shot_id: String,
    /// Seconds from timeline start at which this segment begins
    pub start: f64,
    /// Segment length in seconds, including any hold
    pub duration: f64,
    /// Seconds the camera motion runs; the remainder freezes the last frame
    pub motion_duration: f64,
    /// Transition into the next segment (None for the last one)
    pub transition_to_next: Option<Transition>,
}

impl TimelineSegment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Frames for this segment at the given rate.
    pub fn frame_count(&self, fps: f64) -> u32 {
        (self.duration * fps).round().max(1.0) as u32
    }
}

/// Ordered segments plus derived totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Timeline {
    pub fps: f64,
    pub segments: Vec<TimelineSegment>,
    /// Sum of segment durations minus every dissolve overlap
    pub total_duration: f64,
}

impl Timeline {
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.segments
            .iter()
            .filter_map(|s| s.transition_to_next.as_ref())
    }

    pub fn transition_count(&self) -> usize {
        self.transitions().count()
    }

    /// Segment start offsets in order.
    pub fn offsets(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.start).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
