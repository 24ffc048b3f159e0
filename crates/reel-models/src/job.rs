//! Plan job definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::image::{ImageAttributes, Orientation};
use crate::motion::MotionPack;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic seed for motion generation; a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Seed {
    Number(u64),
    Text(String),
}

impl Default for Seed {
    fn default() -> Self {
        Seed::Number(0)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seed::Number(n) => write!(f, "{}", n),
            Seed::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Seed {
    fn from(s: &str) -> Self {
        Seed::Text(s.to_string())
    }
}

impl From<u64> for Seed {
    fn from(n: u64) -> Self {
        Seed::Number(n)
    }
}

/// One source image of a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanImage {
    /// Stable image identifier (also the saliency cache key)
    pub id: String,
    /// Local path of the source file
    pub path: String,
    /// EXIF orientation tag, upright when absent
    #[serde(default)]
    pub orientation: Orientation,
    /// Attributes already known for this image; the vision collaborator is
    /// only called for images without them
    #[serde(default)]
    pub attributes: Option<ImageAttributes>,
}

/// A planning job: photos in, composition plan out.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanJob {
    #[serde(default)]
    pub job_id: JobId,
    /// Images in input order
    pub images: Vec<PlanImage>,
    /// Target aspect as "W:H", a decimal, or a label like "portrait"
    #[serde(default = "default_target_aspect")]
    pub target_aspect: String,
    #[serde(default)]
    pub pack: MotionPack,
    #[serde(default)]
    pub seed: Seed,
    /// Candidate ordering from the sequencing collaborator (untrusted)
    #[serde(default)]
    pub candidate_order: Option<Vec<String>>,
    /// Narrative purpose hints keyed by image id (untrusted, free-form)
    #[serde(default)]
    pub role_hints: BTreeMap<String, String>,
    /// Desired total length in seconds; fixed per-shot durations when absent
    #[serde(default)]
    pub target_duration: Option<f64>,
}

fn default_target_aspect() -> String {
    "9:16".to_string()
}

impl PlanJob {
    /// Image ids in input order.
    pub fn image_ids(&self) -> Vec<String> {
        self.images.iter().map(|i| i.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generation() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_seed_accepts_string_or_number() {
        let text: Seed = serde_json::from_str("\"job-1\"").unwrap();
        assert_eq!(text, Seed::Text("job-1".into()));
        let number: Seed = serde_json::from_str("42").unwrap();
        assert_eq!(number, Seed::Number(42));
    }

    #[test]
    fn test_minimal_job_defaults() {
        let job: PlanJob = serde_json::from_str(
            r#"{"images": [{"id": "a", "path": "/tmp/a.jpg"}, {"id": "b", "path": "/tmp/b.jpg", "orientation": 6}]}"#,
        )
        .unwrap();
        assert_eq!(job.image_ids(), vec!["a", "b"]);
        assert_eq!(job.target_aspect, "9:16");
        assert_eq!(job.pack, MotionPack::Default);
        assert_eq!(job.images[1].orientation, Orientation(6));
        assert!(job.candidate_order.is_none());
    }
}
