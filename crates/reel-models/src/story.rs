//! Narrative lock over a validated sequence.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shot::Shot;

/// Why a candidate ordering from the sequencing collaborator was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderingRejection {
    /// No candidate ordering was supplied
    Missing,
    WrongLength { expected: usize, actual: usize },
    DuplicateId { id: String },
    UnknownId { id: String },
}

impl fmt::Display for OrderingRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingRejection::Missing => write!(f, "no candidate ordering supplied"),
            OrderingRejection::WrongLength { expected, actual } => {
                write!(f, "expected {} ids, got {}", expected, actual)
            }
            OrderingRejection::DuplicateId { id } => write!(f, "duplicate id {}", id),
            OrderingRejection::UnknownId { id } => write!(f, "unknown id {}", id),
        }
    }
}

/// Result of validating, classifying and down-selecting a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoryLock {
    /// Full validated ordering before down-selection (covers every input id)
    pub ordered_ids: Vec<String>,
    /// Kept shots in sequence order
    pub shots: Vec<Shot>,
    /// Ids removed by down-selection, in sequence order
    pub dropped_ids: Vec<String>,
    /// Hero ids in sequence order
    pub hero_ids: Vec<String>,
    /// Shot reserved for an extended pre-pause
    pub hinge_id: Option<String>,
    /// Interior cluster eligible for soft transitions
    pub dissolve_cluster: Option<u32>,
    /// Set when the candidate ordering was replaced by the fallback
    pub ordering_rejection: Option<OrderingRejection>,
}

impl StoryLock {
    /// Kept shot ids in sequence order.
    pub fn kept_ids(&self) -> Vec<&str> {
        self.shots.iter().map(|s| s.image_id.as_str()).collect()
    }

    pub fn is_hero(&self, image_id: &str) -> bool {
        self.hero_ids.iter().any(|h| h == image_id)
    }

    pub fn is_hinge(&self, image_id: &str) -> bool {
        self.hinge_id.as_deref() == Some(image_id)
    }

    /// Whether the candidate ordering was used as-is.
    pub fn ordering_accepted(&self) -> bool {
        self.ordering_rejection.is_none()
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }
}
