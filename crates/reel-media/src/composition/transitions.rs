//! Editorial transition selection.
//!
//! One transition per adjacent pair, chosen by a fixed rule order:
//!
//! 1. Hinge pre-pause: the incoming shot is the hinge
//! 2. Continuity guards: clashing pan or zoom forces a cut
//! 3. Dissolve cluster: both shots in the story's soft cluster
//! 4. Phase rules (intro, development, climax, resolve)
//! 5. Budgets: dissolve-class transitions are capped and never adjacent
//!
//! Every transition carries the reason of the rule that produced it.

use reel_models::{MotionSpec, Shot, StoryLock, Transition, TransitionReason};
use tracing::debug;

use super::config::TransitionConfig;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Negative,
    Still,
    Positive,
}

impl PanDirection {
    fn of(start: f64, end: f64, epsilon: f64) -> Self {
        let delta = end - start;
        if delta > epsilon {
            PanDirection::Positive
        } else if delta < -epsilon {
            PanDirection::Negative
        } else {
            PanDirection::Still
        }
    }

    fn conflicts_with(self, other: PanDirection) -> bool {
        matches!(
            (self, other),
            (PanDirection::Positive, PanDirection::Negative)
                | (PanDirection::Negative, PanDirection::Positive)
        )
    }
}

/// Motion direction summary of one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionVector {
    pub zoom: ZoomDirection,
    pub pan_x: PanDirection,
    pub pan_y: PanDirection,
}

impl MotionVector {
    pub fn of(spec: &MotionSpec, config: &TransitionConfig) -> Self {
        let delta = spec.end_zoom - spec.start_zoom;
        let zoom = if delta > config.zoom_epsilon {
            ZoomDirection::In
        } else if delta < -config.zoom_epsilon {
            ZoomDirection::Out
        } else {
            ZoomDirection::Static
        };
        Self {
            zoom,
            pan_x: PanDirection::of(spec.start_pan_x, spec.end_pan_x, config.pan_epsilon),
            pan_y: PanDirection::of(spec.start_pan_y, spec.end_pan_y, config.pan_epsilon),
        }
    }

    pub fn is_near_static(&self) -> bool {
        self.zoom == ZoomDirection::Static
            && self.pan_x == PanDirection::Still
            && self.pan_y == PanDirection::Still
    }

    fn pan_conflict(&self, other: &MotionVector) -> bool {
        self.pan_x.conflicts_with(other.pan_x) || self.pan_y.conflicts_with(other.pan_y)
    }

    fn zoom_conflict(&self, other: &MotionVector) -> bool {
        matches!(
            (self.zoom, other.zoom),
            (ZoomDirection::In, ZoomDirection::Out) | (ZoomDirection::Out, ZoomDirection::In)
        )
    }
}

/// Emotional intensity of a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    Low,
    Medium,
    High,
}

impl Intensity {
    pub fn at(position: f64) -> Self {
        if (0.75..=0.90).contains(&position) {
            Intensity::High
        } else if (0.30..0.75).contains(&position) {
            Intensity::Medium
        } else {
            Intensity::Low
        }
    }
}

/// Sequence phase of a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Intro,
    Development,
    Climax,
    Resolve,
}

impl Phase {
    pub fn at(position: f64) -> Self {
        if position < 0.15 {
            Phase::Intro
        } else if position < 0.70 {
            Phase::Development
        } else if position <= 0.90 {
            Phase::Climax
        } else {
            Phase::Resolve
        }
    }
}

/// One shot as seen by the selector.
#[derive(Debug, Clone, Copy)]
pub struct TransitionShot<'a> {
    pub shot: &'a Shot,
    pub motion: &'a MotionSpec,
    /// Source is taller than wide after rotation
    pub portrait: bool,
}

/// Maximum dissolve-class transitions for `slots` boundaries.
pub fn dissolve_budget(slots: usize, fraction: f64) -> usize {
    ((slots as f64 * fraction).round() as usize).max(1)
}

/// Normalized position of the boundary after shot `index` (the incoming
/// shot's position).
pub fn boundary_position(index: usize, shot_count: usize) -> f64 {
    if shot_count > 1 {
        (index + 1) as f64 / (shot_count - 1) as f64
    } else {
        1.0
    }
}

pub struct TransitionSelector {
    config: TransitionConfig,
}

impl TransitionSelector {
    pub fn new(config: TransitionConfig) -> Self {
        Self { config }
    }

    /// Choose transitions for every adjacent pair of `shots`.
    pub fn select(&self, shots: &[TransitionShot<'_>], story: &StoryLock) -> Vec<Transition> {
        if shots.len() < 2 {
            return Vec::new();
        }

        let slots = shots.len() - 1;
        let budget = dissolve_budget(slots, self.config.dissolve_budget_fraction);
        let vectors: Vec<MotionVector> = shots
            .iter()
            .map(|s| MotionVector::of(s.motion, &self.config))
            .collect();

        let mut used = 0usize;
        let mut transitions: Vec<Transition> = Vec::with_capacity(slots);
        for index in 0..slots {
            let proposed = self.propose(index, shots, &vectors, story);

            let previous_soft = transitions
                .last()
                .is_some_and(|t| t.kind.is_dissolve_class());
            let transition = if proposed.kind.is_dissolve_class() {
                if previous_soft {
                    metrics::record_transition_downgrade("back_to_back");
                    Transition::cut(index, TransitionReason::BackToBackDowngrade)
                } else if used >= budget {
                    metrics::record_transition_downgrade("budget_cap");
                    Transition::cut(index, TransitionReason::BudgetCapDowngrade)
                } else {
                    used += 1;
                    proposed
                }
            } else {
                proposed
            };

            debug!(
                from_index = index,
                kind = %transition.kind,
                reason = %transition.reason,
                "Transition selected"
            );
            transitions.push(transition);
        }
        transitions
    }

    /// Transition for boundary `index` before budgets are applied.
    fn propose(
        &self,
        index: usize,
        shots: &[TransitionShot<'_>],
        vectors: &[MotionVector],
        story: &StoryLock,
    ) -> Transition {
        let config = &self.config;
        let outgoing = &shots[index];
        let incoming = &shots[index + 1];
        let (a, b) = (&vectors[index], &vectors[index + 1]);

        if story.is_hinge(&incoming.shot.image_id) {
            return Transition::hold(index, config.hinge_hold_seconds, TransitionReason::HingePrePause);
        }

        if a.pan_conflict(b) {
            return Transition::cut(index, TransitionReason::PanConflict);
        }
        if a.zoom_conflict(b) {
            return Transition::cut(index, TransitionReason::ZoomConflict);
        }

        if let Some(cluster) = story.dissolve_cluster {
            if outgoing.shot.cluster_id == cluster && incoming.shot.cluster_id == cluster {
                return Transition::dissolve(index, config.dissolve_seconds, TransitionReason::DissolveCluster);
            }
        }

        let position = boundary_position(index, shots.len());
        let intensity = Intensity::at(position);
        let aligned = a.zoom == b.zoom;
        let both_static = a.is_near_static() && b.is_near_static();

        match Phase::at(position) {
            Phase::Intro => {
                if aligned && intensity != Intensity::High {
                    Transition::dissolve(index, config.dissolve_seconds, TransitionReason::IntroAlignedDissolve)
                } else {
                    Transition::cut(index, TransitionReason::IntroCut)
                }
            }
            Phase::Development => {
                if aligned && a.zoom == ZoomDirection::In && intensity != Intensity::Low {
                    Transition::dissolve(
                        index,
                        config.push_through_seconds,
                        TransitionReason::DevelopmentPushThrough,
                    )
                } else if aligned && intensity == Intensity::Low && !incoming.portrait {
                    Transition::dissolve(
                        index,
                        config.dissolve_seconds,
                        TransitionReason::DevelopmentSoftDissolve,
                    )
                } else {
                    Transition::cut(index, TransitionReason::DevelopmentCut)
                }
            }
            Phase::Climax => {
                if both_static {
                    Transition::hold(index, config.climax_hold_seconds, TransitionReason::ClimaxStaticHold)
                } else if intensity == Intensity::High {
                    Transition::hold(index, config.climax_hold_seconds, TransitionReason::ClimaxIntensityHold)
                } else {
                    Transition::cut(index, TransitionReason::ClimaxCut)
                }
            }
            Phase::Resolve => {
                if index + 2 == shots.len() {
                    Transition::dip_to_black(index, config.dip_seconds, TransitionReason::ResolveDipToBlack)
                } else if both_static {
                    Transition::hold(index, config.resolve_hold_seconds, TransitionReason::ResolveStaticHold)
                } else {
                    Transition::cut(index, TransitionReason::ResolveCut)
                }
            }
        }
    }
}

/// Count of dissolve-class transitions.
pub fn soft_transition_count(transitions: &[Transition]) -> usize {
    transitions
        .iter()
        .filter(|t| t.kind.is_dissolve_class())
        .count()
}

/// Whether any two dissolve-class transitions are adjacent.
pub fn has_back_to_back_soft(transitions: &[Transition]) -> bool {
    transitions.windows(2).any(|pair| {
        pair[0].kind.is_dissolve_class() && pair[1].kind.is_dissolve_class()
    })
}
