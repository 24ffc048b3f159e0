//! Per-image attributes produced by the vision collaborator.
//!
//! The vision service is untrusted: replies may be wrapped in markdown
//! fences, miss fields, or carry out-of-range numbers. Parsing never fails;
//! anything unusable is replaced by a neutral default.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Neutral visual energy used when the collaborator gives none.
pub const NEUTRAL_VISUAL_ENERGY: f64 = 5.0;

/// Clockwise rotation needed to display the source upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Rotation {
    #[default]
    #[serde(rename = "0")]
    None,
    #[serde(rename = "90")]
    Cw90,
    #[serde(rename = "180")]
    Cw180,
    #[serde(rename = "270")]
    Cw270,
}

impl Rotation {
    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Whether width and height trade places after rotation.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }

    /// Dimensions after the rotation is conceptually applied.
    pub fn rotated_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// EXIF orientation tag (1-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Orientation(pub u8);

impl Orientation {
    pub const UPRIGHT: Orientation = Orientation(1);

    /// Rotation component of the orientation tag.
    ///
    /// Mirrored variants (2, 4, 5, 7) map to their rotation; mirroring does
    /// not change the crop geometry. Unknown values are treated as upright.
    pub fn rotation(&self) -> Rotation {
        match self.0 {
            3 | 4 => Rotation::Cw180,
            5 | 6 => Rotation::Cw90,
            7 | 8 => Rotation::Cw270,
            _ => Rotation::None,
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::UPRIGHT
    }
}

/// Emotional read of an image, each axis in 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmotionVector {
    pub calm: f64,
    pub tension: f64,
    pub mystery: f64,
    pub intimacy: f64,
    pub awe: f64,
}

impl EmotionVector {
    /// Evenly balanced vector used when no reading is available.
    pub const BALANCED: EmotionVector = EmotionVector {
        calm: 0.2,
        tension: 0.2,
        mystery: 0.2,
        intimacy: 0.2,
        awe: 0.2,
    };

    fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::BALANCED;
        };
        let axis = |name: &str| {
            map.get(name)
                .and_then(lenient_f64)
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(0.2)
        };
        Self {
            calm: axis("calm"),
            tension: axis("tension"),
            mystery: axis("mystery"),
            intimacy: axis("intimacy"),
            awe: axis("awe"),
        }
    }
}

impl Default for EmotionVector {
    fn default() -> Self {
        Self::BALANCED
    }
}

/// Reply schema requested from the vision collaborator.
///
/// Only used to describe the contract (it is rendered into the prompt as a
/// JSON schema); parsing goes through [`ImageAttributes::from_vision_reply`],
/// which tolerates partial replies.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VisionReply {
    /// Main subject of the photo, e.g. "lighthouse"
    pub subject: String,
    /// Mood tags, e.g. ["moody", "coastal"]
    pub mood: Vec<String>,
    /// Visual energy from 1 (still) to 10 (busy)
    pub visual_energy: f64,
    /// Emotion vector with five axes in 0-1
    pub emotion_vector: EmotionVector,
}

/// Semantic attributes of one source image. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageAttributes {
    pub id: String,
    pub subject: String,
    pub mood: Vec<String>,
    pub emotion: EmotionVector,
    /// Visual energy in 1-10
    pub visual_energy: f64,
    pub width: u32,
    pub height: u32,
}

impl ImageAttributes {
    /// Attributes used when the vision collaborator failed for this image.
    pub fn neutral(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            subject: String::new(),
            mood: Vec::new(),
            emotion: EmotionVector::BALANCED,
            visual_energy: NEUTRAL_VISUAL_ENERGY,
            width,
            height,
        }
    }

    /// Parse a raw vision reply, substituting neutral defaults for anything
    /// missing or malformed.
    pub fn from_vision_reply(id: &str, raw: &str, width: u32, height: u32) -> Self {
        let text = strip_code_fence(raw);
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(image_id = %id, error = %e, "Vision reply is not JSON, using neutral attributes");
                return Self::neutral(id, width, height);
            }
        };

        let Value::Object(map) = &value else {
            warn!(image_id = %id, "Vision reply is not a JSON object, using neutral attributes");
            return Self::neutral(id, width, height);
        };

        let subject = map
            .get("subject")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let mood = match map.get("mood") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            _ => Vec::new(),
        };

        let visual_energy = map
            .get("visual_energy")
            .and_then(lenient_f64)
            .map(|v| v.clamp(1.0, 10.0))
            .unwrap_or(NEUTRAL_VISUAL_ENERGY);

        Self {
            id: id.to_string(),
            subject,
            mood,
            emotion: EmotionVector::from_value(map.get("emotion_vector")),
            visual_energy,
            width,
            height,
        }
    }

    /// Whether two images share a subject or at least one mood tag.
    pub fn shares_theme(&self, other: &ImageAttributes) -> bool {
        let same_subject = !self.subject.is_empty()
            && self.subject.eq_ignore_ascii_case(&other.subject);
        same_subject
            || self
                .mood
                .iter()
                .any(|m| other.mood.iter().any(|o| o.eq_ignore_ascii_case(m)))
    }
}

/// Accept numbers and numeric strings; reject NaN and infinities.
fn lenient_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    v.is_finite().then_some(v)
}

fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_rotation() {
        assert_eq!(Orientation(1).rotation(), Rotation::None);
        assert_eq!(Orientation(6).rotation(), Rotation::Cw90);
        assert_eq!(Orientation(3).rotation(), Rotation::Cw180);
        assert_eq!(Orientation(8).rotation(), Rotation::Cw270);
        assert_eq!(Orientation(42).rotation(), Rotation::None);
        assert_eq!(Rotation::Cw90.rotated_dimensions(4000, 3000), (3000, 4000));
    }

    #[test]
    fn test_parse_full_reply() {
        let raw = r#"```json
        {"subject": "Lighthouse", "mood": ["Moody", "coastal"], "visual_energy": 7,
         "emotion_vector": {"calm": 0.1, "tension": 0.8, "mystery": 0.6, "intimacy": 0.0, "awe": 0.9}}
        ```"#;
        let attrs = ImageAttributes::from_vision_reply("img-1", raw, 4000, 3000);
        assert_eq!(attrs.subject, "Lighthouse");
        assert_eq!(attrs.mood, vec!["moody", "coastal"]);
        assert!((attrs.visual_energy - 7.0).abs() < 1e-9);
        assert!((attrs.emotion.tension - 0.8).abs() < 1e-9);
        assert_eq!(attrs.width, 4000);
    }

    #[test]
    fn test_malformed_reply_uses_neutral_defaults() {
        let attrs = ImageAttributes::from_vision_reply("img-2", "not json at all", 100, 200);
        assert_eq!(attrs, ImageAttributes::neutral("img-2", 100, 200));
        assert!((attrs.visual_energy - NEUTRAL_VISUAL_ENERGY).abs() < 1e-9);
    }

    #[test]
    fn test_partial_reply_clamps_and_defaults() {
        let raw = r#"{"visual_energy": "42", "emotion_vector": {"tension": 3.5}}"#;
        let attrs = ImageAttributes::from_vision_reply("img-3", raw, 10, 10);
        assert!((attrs.visual_energy - 10.0).abs() < 1e-9);
        assert!((attrs.emotion.tension - 1.0).abs() < 1e-9);
        assert!((attrs.emotion.calm - 0.2).abs() < 1e-9);
        assert!(attrs.subject.is_empty());
    }

    #[test]
    fn test_shares_theme() {
        let mut a = ImageAttributes::neutral("a", 1, 1);
        let mut b = ImageAttributes::neutral("b", 1, 1);
        assert!(!a.shares_theme(&b), "empty subjects never match");

        a.mood = vec!["warm".into()];
        b.mood = vec!["Warm".into(), "quiet".into()];
        assert!(a.shares_theme(&b));

        b.mood.clear();
        a.subject = "dog".into();
        b.subject = "Dog".into();
        assert!(a.shares_theme(&b));
    }
}
