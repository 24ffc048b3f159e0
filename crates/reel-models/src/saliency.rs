//! Saliency-driven reframe plan for one image and target aspect.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::image::Rotation;
use crate::rect::CropRect;

/// Normalized point of interest (0-1 on both axes, post-rotation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }
}

/// Crop plan for one (image, target aspect) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SaliencyPlan {
    pub image_id: String,
    /// Rotation derived from the source orientation tag
    pub rotation: Rotation,
    /// Source width after rotation
    pub source_width: u32,
    /// Source height after rotation
    pub source_height: u32,
    /// Crop in post-rotation pixel space
    pub crop: CropRect,
    pub anchor: Anchor,
    /// Confidence of the saliency anchor (0-1)
    pub confidence: f64,
    /// Surface to a human reviewer; never blocks the pipeline
    pub needs_review: bool,
    /// Anchor was ignored in favour of a centered crop
    pub centered_override: bool,
    /// Why a fallback was taken, when one was
    pub reason: Option<String>,
}

impl SaliencyPlan {
    /// Whether the crop keeps the whole source frame.
    pub fn is_uncropped(&self) -> bool {
        self.crop
            .is_full_frame(self.source_width, self.source_height)
    }

    /// Whether the source is taller than wide after rotation.
    pub fn is_portrait_source(&self) -> bool {
        self.source_height > self.source_width
    }
}
