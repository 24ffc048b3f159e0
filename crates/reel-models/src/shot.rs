//! Shot, narrative purpose and beat vocabulary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Narrative purpose hint attached to a shot by the ordering collaborator.
///
/// Two vocabularies are in circulation (establish/build/climax/resolve and
/// opening/build/turn/climax/resolution) plus the contrast/isolate tags;
/// all of them parse into this one enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NarrativePurpose {
    Establish,
    Opening,
    Build,
    Turn,
    Contrast,
    Isolate,
    Climax,
    Resolve,
    Resolution,
}

impl NarrativePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativePurpose::Establish => "establish",
            NarrativePurpose::Opening => "opening",
            NarrativePurpose::Build => "build",
            NarrativePurpose::Turn => "turn",
            NarrativePurpose::Contrast => "contrast",
            NarrativePurpose::Isolate => "isolate",
            NarrativePurpose::Climax => "climax",
            NarrativePurpose::Resolve => "resolve",
            NarrativePurpose::Resolution => "resolution",
        }
    }

    /// Beat forced by this purpose, if any.
    ///
    /// `Build` and `Turn` carry no explicit beat and fall back to the
    /// position-based default.
    pub fn forced_beat(&self) -> Option<Beat> {
        match self {
            NarrativePurpose::Establish | NarrativePurpose::Opening => Some(Beat::Arrival),
            NarrativePurpose::Contrast | NarrativePurpose::Isolate => Some(Beat::Distance),
            NarrativePurpose::Climax => Some(Beat::Peak),
            NarrativePurpose::Resolve | NarrativePurpose::Resolution => Some(Beat::Release),
            NarrativePurpose::Build | NarrativePurpose::Turn => None,
        }
    }

    pub fn is_climax(&self) -> bool {
        matches!(self, NarrativePurpose::Climax)
    }
}

impl fmt::Display for NarrativePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NarrativePurpose {
    type Err = VocabularyParseError;

    /// Keyword classification; tolerant of decorations like "the climax".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let purpose = if lower.contains("resolution") {
            NarrativePurpose::Resolution
        } else if lower.contains("resolve") || lower.contains("ending") {
            NarrativePurpose::Resolve
        } else if lower.contains("climax") || lower.contains("peak") {
            NarrativePurpose::Climax
        } else if lower.contains("establish") {
            NarrativePurpose::Establish
        } else if lower.contains("open") || lower.contains("intro") {
            NarrativePurpose::Opening
        } else if lower.contains("contrast") {
            NarrativePurpose::Contrast
        } else if lower.contains("isolat") {
            NarrativePurpose::Isolate
        } else if lower.contains("turn") {
            NarrativePurpose::Turn
        } else if lower.contains("build") || lower.contains("develop") {
            NarrativePurpose::Build
        } else {
            return Err(VocabularyParseError::new("narrative purpose", s));
        };
        Ok(purpose)
    }
}

/// Narrative beat of a shot within the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Beat {
    Arrival,
    Observation,
    Distance,
    Peak,
    Release,
}

impl Beat {
    pub const ALL: &'static [Beat] = &[
        Beat::Arrival,
        Beat::Observation,
        Beat::Distance,
        Beat::Peak,
        Beat::Release,
    ];

    /// Default beat for a normalized sequence position (0-1).
    pub fn from_position(position: f64) -> Self {
        if position < 0.18 {
            Beat::Arrival
        } else if position < 0.45 {
            Beat::Observation
        } else if position < 0.72 {
            Beat::Distance
        } else if position <= 0.90 {
            Beat::Peak
        } else {
            Beat::Release
        }
    }

    /// Beat for a shot: an explicit purpose always wins over position.
    pub fn assign(purpose: Option<NarrativePurpose>, position: f64) -> Self {
        purpose
            .and_then(|p| p.forced_beat())
            .unwrap_or_else(|| Beat::from_position(position))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Beat::Arrival => "arrival",
            Beat::Observation => "observation",
            Beat::Distance => "distance",
            Beat::Peak => "peak",
            Beat::Release => "release",
        }
    }
}

impl fmt::Display for Beat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hero shots carry the story; support shots fill it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShotRole {
    Hero,
    #[default]
    Support,
}

/// One shot of the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Shot {
    /// Source image id
    pub image_id: String,
    /// Narrative purpose hint, when the ordering collaborator gave one
    pub purpose: Option<NarrativePurpose>,
    pub beat: Beat,
    pub role: ShotRole,
    /// Contiguous cluster of visually/thematically similar shots
    pub cluster_id: u32,
}

impl Shot {
    pub fn is_hero(&self) -> bool {
        self.role == ShotRole::Hero
    }
}

#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct VocabularyParseError {
    kind: &'static str,
    value: String,
}

impl VocabularyParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_parsing_both_vocabularies() {
        assert_eq!("establish".parse::<NarrativePurpose>().unwrap(), NarrativePurpose::Establish);
        assert_eq!("Opening".parse::<NarrativePurpose>().unwrap(), NarrativePurpose::Opening);
        assert_eq!("the turn".parse::<NarrativePurpose>().unwrap(), NarrativePurpose::Turn);
        assert_eq!("CLIMAX".parse::<NarrativePurpose>().unwrap(), NarrativePurpose::Climax);
        assert_eq!("resolution".parse::<NarrativePurpose>().unwrap(), NarrativePurpose::Resolution);
        assert_eq!("resolve".parse::<NarrativePurpose>().unwrap(), NarrativePurpose::Resolve);
        assert_eq!("isolate".parse::<NarrativePurpose>().unwrap(), NarrativePurpose::Isolate);
        assert!("banana".parse::<NarrativePurpose>().is_err());
    }

    #[test]
    fn test_beat_from_position_bands() {
        assert_eq!(Beat::from_position(0.0), Beat::Arrival);
        assert_eq!(Beat::from_position(0.17), Beat::Arrival);
        assert_eq!(Beat::from_position(0.18), Beat::Observation);
        assert_eq!(Beat::from_position(0.5), Beat::Distance);
        assert_eq!(Beat::from_position(0.8), Beat::Peak);
        assert_eq!(Beat::from_position(0.95), Beat::Release);
    }

    #[test]
    fn test_purpose_overrides_position() {
        assert_eq!(Beat::assign(Some(NarrativePurpose::Climax), 0.1), Beat::Peak);
        assert_eq!(Beat::assign(Some(NarrativePurpose::Establish), 0.9), Beat::Arrival);
        assert_eq!(Beat::assign(Some(NarrativePurpose::Contrast), 0.0), Beat::Distance);
        assert_eq!(Beat::assign(Some(NarrativePurpose::Build), 0.5), Beat::Distance);
        assert_eq!(Beat::assign(None, 0.99), Beat::Release);
    }
}
