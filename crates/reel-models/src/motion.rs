//! Camera motion vocabulary for still-image shots.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shot::VocabularyParseError;

/// Motion preset applied to one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionPreset {
    Static,
    PushIn,
    PullBack,
    DriftLeft,
    DriftRight,
}

impl MotionPreset {
    /// All presets, in weight-table order.
    pub const ALL: &'static [MotionPreset] = &[
        MotionPreset::Static,
        MotionPreset::PushIn,
        MotionPreset::DriftLeft,
        MotionPreset::DriftRight,
        MotionPreset::PullBack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MotionPreset::Static => "static",
            MotionPreset::PushIn => "push_in",
            MotionPreset::PullBack => "pull_back",
            MotionPreset::DriftLeft => "drift_left",
            MotionPreset::DriftRight => "drift_right",
        }
    }

    pub fn is_drift(&self) -> bool {
        matches!(self, MotionPreset::DriftLeft | MotionPreset::DriftRight)
    }
}

impl fmt::Display for MotionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Motion pack: a named table of preset weights and magnitude limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionPack {
    #[default]
    Default,
    Documentary,
}

impl MotionPack {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionPack::Default => "default",
            MotionPack::Documentary => "documentary",
        }
    }
}

impl fmt::Display for MotionPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MotionPack {
    type Err = VocabularyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "" => Ok(MotionPack::Default),
            "documentary" | "doc" => Ok(MotionPack::Documentary),
            _ => Err(VocabularyParseError::new("motion pack", s)),
        }
    }
}

/// Easing curve applied to zoom and pan progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    /// Cubic smoothstep: zero velocity at both ends
    #[default]
    SmoothStep,
    /// Half-cosine ease-in-out
    Sine,
}

impl Easing {
    /// Map linear progress `t` (clamped to 0-1) onto the curve.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::SmoothStep => t * t * (3.0 - 2.0 * t),
            Easing::Sine => 0.5 - 0.5 * (std::f64::consts::PI * t).cos(),
        }
    }
}

/// Low-amplitude handheld noise superimposed on the pan.
///
/// Attenuated by `sin(pi * t)` so it vanishes at both cut points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionNoise {
    /// Peak amplitude as a fraction of frame width
    pub amplitude: f64,
    /// Oscillations per shot
    pub frequency: f64,
    /// Phase offset in radians
    pub phase: f64,
}

impl MotionNoise {
    /// Noise offset (fraction of frame) at progress `t`.
    pub fn offset(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let envelope = (std::f64::consts::PI * t).sin();
        self.amplitude
            * envelope
            * (2.0 * std::f64::consts::PI * self.frequency * t + self.phase).sin()
    }
}

/// Motion parameters for one shot.
///
/// Pan offsets are normalized: a fraction of the output frame width (x) or
/// height (y). Positive x moves the view window right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionSpec {
    pub preset: MotionPreset,
    pub start_zoom: f64,
    pub end_zoom: f64,
    pub start_pan_x: f64,
    pub end_pan_x: f64,
    pub start_pan_y: f64,
    pub end_pan_y: f64,
    pub easing: Easing,
    pub noise: Option<MotionNoise>,
    /// Seconds the motion runs over
    pub hold_duration: f64,
}

impl MotionSpec {
    /// A motionless shot.
    pub fn still(hold_duration: f64) -> Self {
        Self {
            preset: MotionPreset::Static,
            start_zoom: 1.0,
            end_zoom: 1.0,
            start_pan_x: 0.0,
            end_pan_x: 0.0,
            start_pan_y: 0.0,
            end_pan_y: 0.0,
            easing: Easing::Linear,
            noise: None,
            hold_duration,
        }
    }

    /// Unclamped zoom and normalized pan (x, y) at progress `t`.
    ///
    /// Callers rendering pixels must clamp through the motion sampler.
    pub fn raw_at(&self, t: f64) -> (f64, f64, f64) {
        let eased = self.easing.apply(t);
        let zoom = self.start_zoom + (self.end_zoom - self.start_zoom) * eased;
        let noise = self.noise.map(|n| n.offset(t)).unwrap_or(0.0);
        let pan_x = self.start_pan_x + (self.end_pan_x - self.start_pan_x) * eased + noise;
        let pan_y = self.start_pan_y + (self.end_pan_y - self.start_pan_y) * eased;
        (zoom, pan_x, pan_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easing_endpoints() {
        for easing in [Easing::Linear, Easing::SmoothStep, Easing::Sine] {
            assert!(easing.apply(0.0).abs() < 1e-12);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-12);
            assert!((easing.apply(0.5) - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_smoothstep_zero_velocity_at_ends() {
        let h = 1e-5;
        let start_velocity = (Easing::SmoothStep.apply(h) - Easing::SmoothStep.apply(0.0)) / h;
        let end_velocity = (Easing::SmoothStep.apply(1.0) - Easing::SmoothStep.apply(1.0 - h)) / h;
        assert!(start_velocity < 1e-3);
        assert!(end_velocity < 1e-3);
    }

    #[test]
    fn test_noise_vanishes_at_cut_points() {
        let noise = MotionNoise {
            amplitude: 0.002,
            frequency: 1.7,
            phase: 0.9,
        };
        assert!(noise.offset(0.0).abs() < 1e-12);
        assert!(noise.offset(1.0).abs() < 1e-12);
        assert!(noise.offset(0.5).abs() <= 0.002);
    }

    #[test]
    fn test_raw_curve_follows_easing() {
        let spec = MotionSpec {
            preset: MotionPreset::PushIn,
            start_zoom: 1.0,
            end_zoom: 1.04,
            start_pan_x: 0.0,
            end_pan_x: 0.01,
            start_pan_y: 0.0,
            end_pan_y: 0.0,
            easing: Easing::SmoothStep,
            noise: None,
            hold_duration: 3.0,
        };
        assert_eq!(spec.raw_at(0.0), (1.0, 0.0, 0.0));
        let (zoom, pan_x, _) = spec.raw_at(1.0);
        assert!((zoom - 1.04).abs() < 1e-12);
        assert!((pan_x - 0.01).abs() < 1e-12);
        let (mid_zoom, _, _) = spec.raw_at(0.5);
        assert!((mid_zoom - 1.02).abs() < 1e-9);
    }

    #[test]
    fn test_pack_parsing() {
        assert_eq!("Documentary".parse::<MotionPack>().unwrap(), MotionPack::Documentary);
        assert_eq!("default".parse::<MotionPack>().unwrap(), MotionPack::Default);
        assert!("vaporwave".parse::<MotionPack>().is_err());
    }
}
