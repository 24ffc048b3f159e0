//! Configuration for the composition planner.

use serde::{Deserialize, Serialize};

/// Saliency crop planning thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    /// Longest edge of the downsampled working image in pixels.
    pub working_size: u32,

    /// Minimum peak/mean energy ratio for the peak to count as an anchor.
    pub peak_mean_ratio_threshold: f64,

    /// Plans below this confidence are flagged for review.
    pub confidence_threshold: f64,

    /// Below this confidence the vertical anchor is clamped to [0.2, 0.8].
    pub high_confidence_threshold: f64,

    /// Upward bias of the crop window, as a fraction of crop height.
    pub headroom_bias: f64,

    /// Source aspects within this distance of the target are left uncropped.
    pub aspect_tolerance: f64,

    /// Below this confidence the anchor is ignored and the crop is centered.
    pub centered_override_below: f64,

    /// Maximum number of cached plans before oldest-first eviction.
    pub cache_capacity: usize,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            working_size: 256,
            peak_mean_ratio_threshold: 3.0,
            confidence_threshold: 0.55,
            high_confidence_threshold: 0.75,
            headroom_bias: 0.06,
            aspect_tolerance: 0.02,
            centered_override_below: 0.35,
            cache_capacity: 512,
        }
    }
}

/// Motion safety limits shared by every pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Pixels kept between the view window and the source edge.
    pub safety_margin_px: f64,

    /// Absolute pan backstop as a fraction of frame width/height.
    pub max_pan_fraction: f64,

    /// Zoom floor for lateral drifts.
    pub drift_min_zoom: f64,

    /// Number of `t` samples checked per shot during validation.
    pub validation_samples: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            safety_margin_px: 1.5,
            max_pan_fraction: 0.02,
            drift_min_zoom: 1.02,
            validation_samples: 64,
        }
    }
}

/// Editorial transition timings and budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Standard dissolve length in seconds.
    pub dissolve_seconds: f64,

    /// Push-through dissolve length in seconds.
    pub push_through_seconds: f64,

    /// Dip-to-black length in seconds.
    pub dip_seconds: f64,

    /// Breath hold added in the climax phase.
    pub climax_hold_seconds: f64,

    /// Breath hold added in the resolve phase.
    pub resolve_hold_seconds: f64,

    /// Pre-pause added before the hinge shot.
    pub hinge_hold_seconds: f64,

    /// Share of transition slots that may be dissolve-class.
    pub dissolve_budget_fraction: f64,

    /// Zoom delta below which a shot counts as zoom-static.
    pub zoom_epsilon: f64,

    /// Pan delta below which an axis counts as not panning.
    pub pan_epsilon: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            dissolve_seconds: 0.4,
            push_through_seconds: 0.55,
            dip_seconds: 0.3,
            climax_hold_seconds: 0.5,
            resolve_hold_seconds: 0.8,
            hinge_hold_seconds: 1.2,
            dissolve_budget_fraction: 0.25,
            zoom_epsilon: 0.002,
            pan_epsilon: 0.0005,
        }
    }
}

/// Timeline pacing and the duration safety net.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Output frame rate.
    pub fps: f64,

    /// Base seconds per shot when the job sets no target duration.
    pub shot_seconds: f64,

    /// Shortest base duration a shot may get from a target-duration split.
    pub min_shot_seconds: f64,

    /// Shortfall below this is treated as rounding and ignored.
    pub pad_tolerance_seconds: f64,

    /// Shortfall above this is a planning bug, not something to pad.
    pub max_pad_seconds: f64,

    /// Short edge of the rendered frame in pixels.
    pub output_short_edge: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            shot_seconds: 2.5,
            min_shot_seconds: 1.0,
            pad_tolerance_seconds: 0.12,
            max_pad_seconds: 3.0,
            output_short_edge: 1080,
        }
    }
}

/// Configuration for the whole composition planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub saliency: SaliencyConfig,
    pub motion: MotionConfig,
    pub transitions: TransitionConfig,
    pub timeline: TimelineConfig,

    /// Keep every validated shot (no down-selection).
    pub gallery_mode: bool,
}

impl PlannerConfig {
    /// Slower pacing with longer dissolves for documentary cuts.
    pub fn documentary() -> Self {
        Self {
            transitions: TransitionConfig {
                dissolve_seconds: 0.5,
                push_through_seconds: 0.65,
                ..Default::default()
            },
            timeline: TimelineConfig {
                shot_seconds: 3.2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Every photo is kept, at a brisk fixed pace.
    pub fn gallery() -> Self {
        Self {
            timeline: TimelineConfig {
                shot_seconds: 2.0,
                ..Default::default()
            },
            gallery_mode: true,
            ..Default::default()
        }
    }

    /// Builder: Set gallery mode.
    pub fn with_gallery_mode(mut self, enabled: bool) -> Self {
        self.gallery_mode = enabled;
        self
    }

    /// Builder: Set output frame rate.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.timeline.fps = fps;
        self
    }

    /// Builder: Set fixed seconds per shot.
    pub fn with_shot_seconds(mut self, seconds: f64) -> Self {
        self.timeline.shot_seconds = seconds;
        self
    }

    /// Builder: Set the saliency cache bound.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.saliency.cache_capacity = capacity;
        self
    }

    /// Builder: Set saliency confidence thresholds.
    pub fn with_confidence_thresholds(mut self, review: f64, high: f64) -> Self {
        self.saliency.confidence_threshold = review;
        self.saliency.high_confidence_threshold = high;
        self
    }

    /// Builder: Set the headroom bias.
    pub fn with_headroom_bias(mut self, bias: f64) -> Self {
        self.saliency.headroom_bias = bias;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlannerConfig::default();
        assert_eq!(config.saliency.working_size, 256);
        assert_eq!(config.timeline.fps, 30.0);
        assert!((config.transitions.dissolve_seconds - 0.4).abs() < 1e-9);
        assert!(!config.gallery_mode);
    }

    #[test]
    fn test_presets() {
        assert!(PlannerConfig::gallery().gallery_mode);
        let doc = PlannerConfig::documentary();
        assert!(doc.transitions.dissolve_seconds > PlannerConfig::default().transitions.dissolve_seconds);
        assert!(!doc.gallery_mode);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PlannerConfig::default()
            .with_fps(24.0)
            .with_shot_seconds(3.0)
            .with_cache_capacity(4)
            .with_gallery_mode(true);
        assert_eq!(config.timeline.fps, 24.0);
        assert_eq!(config.timeline.shot_seconds, 3.0);
        assert_eq!(config.saliency.cache_capacity, 4);
        assert!(config.gallery_mode);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"gallery_mode": true, "timeline": {"fps": 25}}"#).unwrap();
        assert!(config.gallery_mode);
        assert_eq!(config.timeline.fps, 25.0);
        assert_eq!(config.timeline.shot_seconds, 2.5);
        assert_eq!(config.saliency.cache_capacity, 512);
    }
}
