//! Seeded Ken-Burns motion for still shots.
//!
//! Each shot draws a preset from its pack's weight table, nudged away from
//! recent presets, then draws magnitudes within the pack's limits. Output is
//! a pure function of (seed, shot index, shot count, previous two presets).
//!
//! Pixel translations are never trusted as generated: [`MotionSampler`]
//! re-clamps zoom and pan at every sampled `t` so the view window cannot
//! leave the source frame.

use std::f64::consts::PI;

use reel_models::{Easing, MotionNoise, MotionPack, MotionPreset, MotionSpec, Seed};
use tracing::trace;

use super::config::MotionConfig;
use super::rng::SeededRng;
use crate::error::{MediaError, MediaResult};

/// Share of a drift's geometric headroom the drift target may use.
const DRIFT_HEADROOM_SHARE: f64 = 0.85;

/// Weight multipliers applied by the anti-repeat rules.
const DRIFT_REPEAT_FACTOR: f64 = 0.25;
const PULL_REPEAT_FACTOR: f64 = 0.35;
const STATIC_BOOST_FACTOR: f64 = 1.8;

/// Slack for floating-point comparisons during validation.
const VALIDATION_EPSILON: f64 = 1e-6;

/// Weight table and magnitude limits of one motion pack.
#[derive(Debug, Clone, PartialEq)]
pub struct PackProfile {
    /// Weights in [`MotionPreset::ALL`] order
    pub weights: [f64; 5],
    pub min_scale: f64,
    pub max_scale: f64,
    /// Hard zoom ceiling
    pub ceiling: f64,
    /// Drift target as a fraction of frame width
    pub drift: f64,
    /// Eased pan during push-in/pull-back, as a fraction of frame width
    pub push_pan: f64,
    /// Handheld noise amplitude on drifts (0 disables)
    pub noise_amplitude: f64,
}

impl PackProfile {
    pub fn for_pack(pack: MotionPack) -> Self {
        match pack {
            MotionPack::Default => Self {
                weights: [0.30, 0.30, 0.12, 0.12, 0.16],
                min_scale: 1.015,
                max_scale: 1.035,
                ceiling: 1.035,
                drift: 0.012,
                push_pan: 0.0,
                noise_amplitude: 0.0,
            },
            MotionPack::Documentary => Self {
                weights: [0.20, 0.32, 0.16, 0.16, 0.16],
                min_scale: 1.02,
                max_scale: 1.06,
                ceiling: 1.06,
                drift: 0.018,
                push_pan: 0.006,
                noise_amplitude: 0.0015,
            },
        }
    }
}

/// Preset weights after the anti-repeat rules, normalized to sum to 1.
///
/// `previous` lists earlier presets, most recent last.
pub fn adjusted_weights(base: &[f64; 5], previous: &[MotionPreset]) -> [f64; 5] {
    let last = previous.last().copied();
    let before_last = previous.len().checked_sub(2).map(|i| previous[i]);

    let recent_drift = [last, before_last]
        .iter()
        .flatten()
        .any(|p| p.is_drift());
    let last_pulled = last == Some(MotionPreset::PullBack);
    let both_moving = matches!(
        (last, before_last),
        (Some(a), Some(b)) if a != MotionPreset::Static && b != MotionPreset::Static
    );

    let mut weights = *base;
    for (weight, preset) in weights.iter_mut().zip(MotionPreset::ALL) {
        match preset {
            MotionPreset::DriftLeft | MotionPreset::DriftRight if recent_drift => {
                *weight *= DRIFT_REPEAT_FACTOR
            }
            MotionPreset::PullBack if last_pulled => *weight *= PULL_REPEAT_FACTOR,
            MotionPreset::Static if both_moving => *weight *= STATIC_BOOST_FACTOR,
            _ => {}
        }
    }

    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for weight in weights.iter_mut() {
            *weight /= total;
        }
    }
    weights
}

/// Walk the cumulative distribution with one uniform draw.
fn pick_preset(weights: &[f64; 5], draw: f64) -> MotionPreset {
    let mut cumulative = 0.0;
    for (weight, preset) in weights.iter().zip(MotionPreset::ALL) {
        cumulative += weight;
        if draw < cumulative {
            return *preset;
        }
    }
    MotionPreset::ALL[MotionPreset::ALL.len() - 1]
}

/// Motion generator for one job.
#[derive(Debug, Clone)]
pub struct MotionGenerator {
    config: MotionConfig,
    profile: PackProfile,
    seed: Seed,
}

impl MotionGenerator {
    pub fn new(config: MotionConfig, pack: MotionPack, seed: Seed) -> Self {
        Self {
            config,
            profile: PackProfile::for_pack(pack),
            seed,
        }
    }

    pub fn profile(&self) -> &PackProfile {
        &self.profile
    }

    /// Motion for one shot given the presets chosen before it.
    pub fn generate(
        &self,
        shot_index: usize,
        total_shots: usize,
        previous: &[MotionPreset],
        hold_duration: f64,
    ) -> MotionSpec {
        let mut rng = SeededRng::for_shot(&self.seed, shot_index, total_shots);
        let weights = adjusted_weights(&self.profile.weights, previous);
        let preset = pick_preset(&weights, rng.next_f64());

        let spec = self.parameters(preset, &mut rng, hold_duration);
        trace!(
            shot_index = shot_index,
            preset = %preset,
            start_zoom = spec.start_zoom,
            end_zoom = spec.end_zoom,
            "Generated motion"
        );
        spec
    }

    /// Motion for a whole sequence, threading preset history through.
    pub fn generate_sequence(&self, total_shots: usize, hold_duration: f64) -> Vec<MotionSpec> {
        let mut history: Vec<MotionPreset> = Vec::with_capacity(total_shots);
        let mut specs = Vec::with_capacity(total_shots);
        for index in 0..total_shots {
            let window_start = history.len().saturating_sub(2);
            let spec = self.generate(index, total_shots, &history[window_start..], hold_duration);
            history.push(spec.preset);
            specs.push(spec);
        }
        specs
    }

    fn parameters(&self, preset: MotionPreset, rng: &mut SeededRng, hold_duration: f64) -> MotionSpec {
        let profile = &self.profile;
        let still = MotionSpec::still(hold_duration);

        match preset {
            MotionPreset::Static => still,
            MotionPreset::PushIn | MotionPreset::PullBack => {
                let scale = rng
                    .range(profile.min_scale, profile.max_scale)
                    .min(profile.ceiling);
                let pan = if profile.push_pan > 0.0 {
                    let direction = if rng.next_f64() < 0.5 { -1.0 } else { 1.0 };
                    direction * profile.push_pan.min((scale - 1.0) / 2.0 * DRIFT_HEADROOM_SHARE)
                } else {
                    0.0
                };
                let (start_zoom, end_zoom, start_pan_x, end_pan_x) = if preset == MotionPreset::PushIn {
                    (1.0, scale, 0.0, pan)
                } else {
                    (scale, 1.0, pan, 0.0)
                };
                MotionSpec {
                    preset,
                    start_zoom,
                    end_zoom,
                    start_pan_x,
                    end_pan_x,
                    easing: Easing::SmoothStep,
                    ..still
                }
            }
            MotionPreset::DriftLeft | MotionPreset::DriftRight => {
                let floor = self.config.drift_min_zoom.min(profile.ceiling);
                let zoom = rng
                    .range(profile.min_scale.max(floor), profile.max_scale.max(floor))
                    .min(profile.ceiling);
                let magnitude = profile
                    .drift
                    .min((zoom - 1.0) / 2.0 * DRIFT_HEADROOM_SHARE);
                let direction = if preset == MotionPreset::DriftLeft { -1.0 } else { 1.0 };
                let noise = (profile.noise_amplitude > 0.0).then(|| MotionNoise {
                    amplitude: profile.noise_amplitude,
                    frequency: rng.range(0.5, 1.5),
                    phase: rng.range(0.0, 2.0 * PI),
                });
                MotionSpec {
                    preset,
                    start_zoom: zoom,
                    end_zoom: zoom,
                    end_pan_x: direction * magnitude,
                    easing: Easing::Linear,
                    noise,
                    ..still
                }
            }
        }
    }

    /// Sampler for rendering this generator's specs into a frame.
    pub fn sampler(&self, frame_width: u32, frame_height: u32) -> MotionSampler {
        MotionSampler::new(&self.config, self.profile.ceiling, frame_width, frame_height)
    }
}

/// Zoom and pixel translation at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub zoom: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

/// Largest translation that keeps a window zoomed by `zoom` inside a frame
/// of `frame_dim` pixels, less `margin`.
pub fn max_safe_translation(zoom: f64, frame_dim: f64, margin: f64) -> f64 {
    (frame_dim * (zoom - 1.0) / 2.0 - margin).max(0.0)
}

/// Sign-preserving clamp of a requested translation to the safe bound.
pub fn clamp_translation(requested: f64, zoom: f64, frame_dim: f64, margin: f64) -> f64 {
    let limit = max_safe_translation(zoom, frame_dim, margin);
    requested.clamp(-limit, limit)
}

/// Evaluates motion specs in pixel space with every safety clamp applied.
#[derive(Debug, Clone, Copy)]
pub struct MotionSampler {
    ceiling: f64,
    margin: f64,
    max_pan_fraction: f64,
    frame_width: f64,
    frame_height: f64,
}

impl MotionSampler {
    pub fn new(config: &MotionConfig, ceiling: f64, frame_width: u32, frame_height: u32) -> Self {
        Self {
            ceiling,
            margin: config.safety_margin_px,
            max_pan_fraction: config.max_pan_fraction,
            frame_width: frame_width as f64,
            frame_height: frame_height as f64,
        }
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Clamped zoom and translation at progress `t`.
    pub fn sample(&self, spec: &MotionSpec, t: f64) -> MotionSample {
        let (zoom, pan_x, pan_y) = spec.raw_at(t);
        let zoom = if zoom.is_finite() {
            zoom.clamp(1.0, self.ceiling)
        } else {
            1.0
        };

        MotionSample {
            zoom,
            translate_x: self.clamp_axis(pan_x, zoom, self.frame_width),
            translate_y: self.clamp_axis(pan_y, zoom, self.frame_height),
        }
    }

    fn clamp_axis(&self, pan: f64, zoom: f64, frame_dim: f64) -> f64 {
        if !pan.is_finite() {
            return 0.0;
        }
        let backstop = self.max_pan_fraction * frame_dim;
        clamp_translation(pan * frame_dim, zoom, frame_dim, self.margin).clamp(-backstop, backstop)
    }

    /// Whether a sample honours every bound.
    fn check(&self, sample: &MotionSample) -> Result<(), String> {
        if !(1.0 - VALIDATION_EPSILON..=self.ceiling + VALIDATION_EPSILON).contains(&sample.zoom) {
            return Err(format!("zoom {:.5} outside [1, {:.3}]", sample.zoom, self.ceiling));
        }
        for (axis, translate, dim) in [
            ("x", sample.translate_x, self.frame_width),
            ("y", sample.translate_y, self.frame_height),
        ] {
            let limit = max_safe_translation(sample.zoom, dim, self.margin)
                .min(self.max_pan_fraction * dim);
            if translate.abs() > limit + VALIDATION_EPSILON {
                return Err(format!(
                    "{} translation {:.3}px exceeds safe {:.3}px at zoom {:.5}",
                    axis, translate, limit, sample.zoom
                ));
            }
        }
        Ok(())
    }
}

/// Validate a spec's stored zooms and its sampled curve on a dense grid.
///
/// # Errors
/// `UnsafeMotion` on the first violation.
pub fn validate_motion(
    spec: &MotionSpec,
    sampler: &MotionSampler,
    samples: usize,
    shot_index: usize,
) -> MediaResult<()> {
    let range = 1.0 - VALIDATION_EPSILON..=sampler.ceiling + VALIDATION_EPSILON;
    for (label, zoom) in [("start", spec.start_zoom), ("end", spec.end_zoom)] {
        if !range.contains(&zoom) {
            return Err(MediaError::unsafe_motion(
                shot_index,
                format!("{} zoom {:.5} outside [1, {:.3}]", label, zoom, sampler.ceiling),
            ));
        }
    }
    if !spec.hold_duration.is_finite() || spec.hold_duration < 0.0 {
        return Err(MediaError::unsafe_motion(
            shot_index,
            format!("hold duration {} is not a valid length", spec.hold_duration),
        ));
    }

    let steps = samples.max(2);
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let sample = sampler.sample(spec, t);
        sampler
            .check(&sample)
            .map_err(|detail| MediaError::unsafe_motion(shot_index, format!("t={:.3}: {}", t, detail)))?;
    }
    Ok(())
}
