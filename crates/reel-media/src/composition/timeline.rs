//! Timeline assembly.
//!
//! Turns base shot durations and the transition plan into segment start
//! offsets the encoder can consume. A hold lengthens the outgoing segment
//! (its motion finishes on time and the last frame freezes); a dissolve or
//! dip overlaps the tail of one segment with the head of the next.
//!
//! `start(0) = 0`, `start(i+1) = start(i) + duration(i) - overlap(i)`, and
//! the total is the sum of durations minus every overlap.

use reel_models::{Timeline, TimelineSegment, Transition};
use tracing::{debug, warn};

use super::config::TimelineConfig;
use crate::error::{MediaError, MediaResult};

const TIMING_EPSILON: f64 = 1e-6;

/// Round seconds to whole frames, never below one frame.
pub fn quantize(seconds: f64, fps: f64) -> f64 {
    let frames = (seconds * fps).round().max(1.0);
    frames / fps
}

/// Round seconds down to whole frames (zero allowed).
fn quantize_down(seconds: f64, fps: f64) -> f64 {
    (seconds * fps + TIMING_EPSILON).floor().max(0.0) / fps
}

pub struct TimelineAssembler {
    config: TimelineConfig,
}

impl TimelineAssembler {
    pub fn new(config: TimelineConfig) -> Self {
        Self { config }
    }

    pub fn fps(&self) -> f64 {
        self.config.fps
    }

    /// Base (pre-hold) duration of every shot.
    ///
    /// With a target, every shot gets `(target + sum(overlaps) - sum(holds)) / n`
    /// so that the assembled total lands on the target; otherwise the fixed
    /// per-shot length applies.
    pub fn base_durations(
        &self,
        shot_count: usize,
        transitions: &[Transition],
        target_duration: Option<f64>,
    ) -> MediaResult<Vec<f64>> {
        let fps = self.config.fps;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MediaError::timeline(format!("invalid frame rate {}", fps)));
        }
        if shot_count == 0 {
            return Ok(Vec::new());
        }

        let seconds = match target_duration {
            None => self.config.shot_seconds,
            Some(target) if !target.is_finite() || target <= 0.0 => {
                return Err(MediaError::invalid_job(format!(
                    "target duration must be positive, got {}",
                    target
                )));
            }
            Some(target) => {
                let overlaps: f64 = transitions.iter().map(Transition::overlap).sum();
                let holds: f64 = transitions.iter().map(|t| t.hold_seconds).sum();
                let per_shot = (target + overlaps - holds) / shot_count as f64;
                if per_shot < self.config.min_shot_seconds {
                    warn!(
                        target = target,
                        per_shot = per_shot,
                        min = self.config.min_shot_seconds,
                        "Target too short for shot count, using minimum shot length"
                    );
                    self.config.min_shot_seconds
                } else {
                    per_shot
                }
            }
        };

        Ok(vec![quantize(seconds, fps); shot_count])
    }

    /// Assemble segments from base durations and transitions.
    ///
    /// # Errors
    /// `TimelineInvariant` when inputs disagree in length, a duration is not
    /// positive, or the resulting offsets break monotonicity.
    pub fn assemble(
        &self,
        shot_ids: &[String],
        base_durations: &[f64],
        transitions: &[Transition],
    ) -> MediaResult<Timeline> {
        let fps = self.config.fps;
        let count = shot_ids.len();

        if base_durations.len() != count {
            return Err(MediaError::timeline(format!(
                "{} durations for {} shots",
                base_durations.len(),
                count
            )));
        }
        if transitions.len() != count.saturating_sub(1) {
            return Err(MediaError::timeline(format!(
                "{} transitions for {} shots",
                transitions.len(),
                count
            )));
        }
        for (index, transition) in transitions.iter().enumerate() {
            if transition.from_index != index {
                return Err(MediaError::timeline(format!(
                    "transition {} claims to leave shot {}",
                    index, transition.from_index
                )));
            }
            if transition.duration < 0.0 || transition.hold_seconds < 0.0 {
                return Err(MediaError::timeline(format!(
                    "transition {} has negative timing",
                    index
                )));
            }
        }

        let mut motion_durations = Vec::with_capacity(count);
        let mut durations = Vec::with_capacity(count);
        for (index, &base) in base_durations.iter().enumerate() {
            if !base.is_finite() || base <= 0.0 {
                return Err(MediaError::timeline(format!(
                    "shot {} has non-positive duration {}",
                    index, base
                )));
            }
            let motion = quantize(base, fps);
            let hold = transitions.get(index).map_or(0.0, |t| t.hold_seconds);
            motion_durations.push(motion);
            durations.push(quantize(motion + hold, fps));
        }

        let transitions: Vec<Transition> = transitions
            .iter()
            .map(|t| fit_overlap(t, &durations, fps))
            .collect();

        let mut segments = Vec::with_capacity(count);
        let mut start = 0.0;
        for index in 0..count {
            let transition = transitions.get(index).cloned();
            let overlap = transition.as_ref().map_or(0.0, Transition::overlap);
            segments.push(TimelineSegment {
                shot_id: shot_ids[index].clone(),
                start,
                duration: durations[index],
                motion_duration: motion_durations[index],
                transition_to_next: transition,
            });
            start += durations[index] - overlap;
        }

        let total_duration = durations.iter().sum::<f64>()
            - transitions.iter().map(Transition::overlap).sum::<f64>();
        let timeline = Timeline {
            fps,
            segments,
            total_duration: total_duration.max(0.0),
        };

        validate_timeline(&timeline)?;
        debug!(
            segments = timeline.segments.len(),
            total_duration = timeline.total_duration,
            "Timeline assembled"
        );
        Ok(timeline)
    }
}

/// Quantize an overlap and cap it at half the shorter adjacent segment.
fn fit_overlap(transition: &Transition, durations: &[f64], fps: f64) -> Transition {
    let mut fitted = transition.clone();
    if !transition.kind.is_dissolve_class() {
        fitted.duration = 0.0;
        return fitted;
    }

    let index = transition.from_index;
    let shorter = durations[index].min(durations[index + 1]);
    let cap = quantize_down(shorter / 2.0, fps);
    let wanted = quantize(transition.duration, fps);
    if wanted > cap {
        debug!(
            from_index = index,
            wanted = wanted,
            cap = cap,
            "Overlap capped at half the shorter shot"
        );
    }
    fitted.duration = wanted.min(cap);
    fitted
}

/// Check the encoder contract: non-negative overlaps shorter than both
/// neighbours, non-decreasing starts, and a total matching the last end.
pub fn validate_timeline(timeline: &Timeline) -> MediaResult<()> {
    let segments = &timeline.segments;
    for (index, segment) in segments.iter().enumerate() {
        if segment.duration <= 0.0 || !segment.duration.is_finite() {
            return Err(MediaError::timeline(format!(
                "segment {} has duration {}",
                index, segment.duration
            )));
        }
        if segment.motion_duration > segment.duration + TIMING_EPSILON {
            return Err(MediaError::timeline(format!(
                "segment {} motion outlasts the segment",
                index
            )));
        }
        if let Some(transition) = &segment.transition_to_next {
            let overlap = transition.overlap();
            let next = segments.get(index + 1).ok_or_else(|| {
                MediaError::timeline(format!("last segment {} has a transition", index))
            })?;
            if overlap < 0.0 || overlap >= segment.duration || overlap >= next.duration {
                return Err(MediaError::timeline(format!(
                    "overlap {:.3}s at boundary {} does not fit its segments",
                    overlap, index
                )));
            }
            if next.start + TIMING_EPSILON < segment.start {
                return Err(MediaError::timeline(format!(
                    "segment {} starts before segment {}",
                    index + 1,
                    index
                )));
            }
        } else if index + 1 < segments.len() {
            return Err(MediaError::timeline(format!(
                "segment {} has no transition to its successor",
                index
            )));
        }
    }

    if let Some(last) = segments.last() {
        if (last.end() - timeline.total_duration).abs() > TIMING_EPSILON {
            return Err(MediaError::timeline(format!(
                "declared total {:.4}s but last segment ends at {:.4}s",
                timeline.total_duration,
                last.end()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{TransitionKind, TransitionReason};

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("s{}", i)).collect()
    }

    fn assembler() -> TimelineAssembler {
        TimelineAssembler::new(TimelineConfig::default())
    }

    #[test]
    fn test_quantize_to_frames() {
        assert!((quantize(1.01, 30.0) - 1.0).abs() < 1e-9);
        assert!((quantize(0.001, 30.0) - 1.0 / 30.0).abs() < 1e-9);
        assert!((quantize(0.55, 30.0) - 17.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_shot_has_one_segment() {
        let timeline = assembler().assemble(&ids(1), &[2.5], &[]).unwrap();
        assert_eq!(timeline.segments.len(), 1);
        assert_eq!(timeline.transition_count(), 0);
        assert!((timeline.total_duration - 2.5).abs() < 1e-9);
        assert!(timeline.segments[0].transition_to_next.is_none());
    }

    #[test]
    fn test_offsets_subtract_overlaps() {
        let transitions = vec![
            Transition::cut(0, TransitionReason::IntroCut),
            Transition::dissolve(1, 0.4, TransitionReason::DevelopmentSoftDissolve),
            Transition::hold(2, 0.5, TransitionReason::ClimaxStaticHold),
        ];
        let timeline = assembler()
            .assemble(&ids(4), &[3.0, 3.0, 3.0, 3.0], &transitions)
            .unwrap();

        let offsets = timeline.offsets();
        assert!((offsets[0] - 0.0).abs() < 1e-9);
        assert!((offsets[1] - 3.0).abs() < 1e-9);
        assert!((offsets[2] - 5.6).abs() < 1e-9);
        assert!((offsets[3] - 9.1).abs() < 1e-9);
        assert!((timeline.segments[2].duration - 3.5).abs() < 1e-9);
        assert!((timeline.segments[2].motion_duration - 3.0).abs() < 1e-9);
        assert!((timeline.total_duration - (12.5 - 0.4)).abs() < 1e-9);

        let last = timeline.segments.last().unwrap();
        assert!((last.start + last.duration - timeline.total_duration).abs() < 1e-9);
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_overlap_capped_at_half_shorter_shot() {
        let transitions = vec![Transition::dissolve(0, 0.55, TransitionReason::DevelopmentPushThrough)];
        let timeline = assembler().assemble(&ids(2), &[3.0, 0.8], &transitions).unwrap();
        let overlap = timeline.segments[0].transition_to_next.as_ref().unwrap().duration;
        assert!((overlap - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_target_duration_split() {
        let transitions = vec![
            Transition::dissolve(0, 0.4, TransitionReason::IntroAlignedDissolve),
            Transition::hold(1, 0.5, TransitionReason::ClimaxIntensityHold),
            Transition::cut(2, TransitionReason::ResolveCut),
        ];
        let assembler = assembler();
        let base = assembler
            .base_durations(4, &transitions, Some(12.0))
            .unwrap();
        // (12 + 0.4 - 0.5) / 4 = 2.975, quantized to 89 frames
        assert!((base[0] - 89.0 / 30.0).abs() < 1e-9);

        let timeline = assembler.assemble(&ids(4), &base, &transitions).unwrap();
        assert!((timeline.total_duration - 12.0).abs() < 4.0 / 30.0);
    }

    #[test]
    fn test_fixed_durations_without_target() {
        let base = assembler().base_durations(3, &[], None).unwrap();
        assert_eq!(base, vec![2.5, 2.5, 2.5]);
        assert!(assembler().base_durations(0, &[], None).unwrap().is_empty());
    }

    #[test]
    fn test_short_target_uses_minimum() {
        let base = assembler().base_durations(10, &[], Some(2.0)).unwrap();
        assert!(base.iter().all(|&d| (d - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        assert!(assembler().base_durations(2, &[], Some(-1.0)).is_err());
        assert!(assembler().base_durations(2, &[], Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_mismatched_inputs_are_invariant_errors() {
        let err = assembler().assemble(&ids(3), &[1.0, 1.0, 1.0], &[]).unwrap_err();
        assert!(matches!(err, MediaError::TimelineInvariant(_)));

        let err = assembler().assemble(&ids(2), &[1.0], &[Transition::cut(0, TransitionReason::IntroCut)]).unwrap_err();
        assert!(matches!(err, MediaError::TimelineInvariant(_)));

        let misplaced = vec![Transition::cut(1, TransitionReason::IntroCut)];
        let err = assembler().assemble(&ids(2), &[1.0, 1.0], &misplaced).unwrap_err();
        assert!(err.is_planning_bug());
    }

    #[test]
    fn test_validate_rejects_bad_total() {
        let mut timeline = assembler().assemble(&ids(1), &[2.0], &[]).unwrap();
        timeline.total_duration = 5.0;
        assert!(validate_timeline(&timeline).is_err());
    }

    #[test]
    fn test_cut_durations_are_zeroed() {
        let mut odd = Transition::cut(0, TransitionReason::IntroCut);
        odd.duration = 0.7;
        let timeline = assembler().assemble(&ids(2), &[2.0, 2.0], &[odd]).unwrap();
        let fitted = timeline.segments[0].transition_to_next.as_ref().unwrap();
        assert_eq!(fitted.kind, TransitionKind::Cut);
        assert_eq!(fitted.duration, 0.0);
        assert!((timeline.total_duration - 4.0).abs() < 1e-9);
    }
}
