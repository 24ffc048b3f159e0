//! Transitions between adjacent shots.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How one shot hands over to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Hard cut, no overlap
    Cut,
    /// Cross-dissolve; overlaps the tail of one shot with the head of the next
    Dissolve,
    /// Freeze on the outgoing shot, then cut
    HoldThenCut,
    /// Brief fade through black; overlaps like a dissolve
    DipToBlack,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Cut => "cut",
            TransitionKind::Dissolve => "dissolve",
            TransitionKind::HoldThenCut => "hold_then_cut",
            TransitionKind::DipToBlack => "dip_to_black",
        }
    }

    /// Eased transitions that count against the dissolve budget.
    pub fn is_dissolve_class(&self) -> bool {
        matches!(self, TransitionKind::Dissolve | TransitionKind::DipToBlack)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which selection rule produced a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    HingePrePause,
    #[serde(rename = "continuity_pan_conflict")]
    PanConflict,
    #[serde(rename = "continuity_zoom_conflict")]
    ZoomConflict,
    DissolveCluster,
    IntroAlignedDissolve,
    IntroCut,
    DevelopmentPushThrough,
    DevelopmentSoftDissolve,
    DevelopmentCut,
    ClimaxStaticHold,
    ClimaxIntensityHold,
    ClimaxCut,
    ResolveDipToBlack,
    ResolveStaticHold,
    ResolveCut,
    BudgetCapDowngrade,
    #[serde(rename = "budget_back_to_back_downgrade")]
    BackToBackDowngrade,
}

impl TransitionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionReason::HingePrePause => "hinge_pre_pause",
            TransitionReason::PanConflict => "continuity_pan_conflict",
            TransitionReason::ZoomConflict => "continuity_zoom_conflict",
            TransitionReason::DissolveCluster => "dissolve_cluster",
            TransitionReason::IntroAlignedDissolve => "intro_aligned_dissolve",
            TransitionReason::IntroCut => "intro_cut",
            TransitionReason::DevelopmentPushThrough => "development_push_through",
            TransitionReason::DevelopmentSoftDissolve => "development_soft_dissolve",
            TransitionReason::DevelopmentCut => "development_cut",
            TransitionReason::ClimaxStaticHold => "climax_static_hold",
            TransitionReason::ClimaxIntensityHold => "climax_intensity_hold",
            TransitionReason::ClimaxCut => "climax_cut",
            TransitionReason::ResolveDipToBlack => "resolve_dip_to_black",
            TransitionReason::ResolveStaticHold => "resolve_static_hold",
            TransitionReason::ResolveCut => "resolve_cut",
            TransitionReason::BudgetCapDowngrade => "budget_cap_downgrade",
            TransitionReason::BackToBackDowngrade => "budget_back_to_back_downgrade",
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transition from shot `from_index` to shot `from_index + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    pub from_index: usize,
    pub kind: TransitionKind,
    /// Overlap duration in seconds (0 for cuts and holds)
    pub duration: f64,
    /// Extra seconds added to the outgoing shot (holds only)
    pub hold_seconds: f64,
    pub reason: TransitionReason,
}

impl Transition {
    pub fn cut(from_index: usize, reason: TransitionReason) -> Self {
        Self {
            from_index,
            kind: TransitionKind::Cut,
            duration: 0.0,
            hold_seconds: 0.0,
            reason,
        }
    }

    pub fn dissolve(from_index: usize, duration: f64, reason: TransitionReason) -> Self {
        Self {
            from_index,
            kind: TransitionKind::Dissolve,
            duration,
            hold_seconds: 0.0,
            reason,
        }
    }

    pub fn dip_to_black(from_index: usize, duration: f64, reason: TransitionReason) -> Self {
        Self {
            from_index,
            kind: TransitionKind::DipToBlack,
            duration,
            hold_seconds: 0.0,
            reason,
        }
    }

    pub fn hold(from_index: usize, hold_seconds: f64, reason: TransitionReason) -> Self {
        Self {
            from_index,
            kind: TransitionKind::HoldThenCut,
            duration: 0.0,
            hold_seconds,
            reason,
        }
    }

    pub fn to_index(&self) -> usize {
        self.from_index + 1
    }

    /// Seconds the two shots overlap on the timeline.
    pub fn overlap(&self) -> f64 {
        if self.kind.is_dissolve_class() {
            self.duration
        } else {
            0.0
        }
    }
}
