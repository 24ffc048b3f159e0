//! Target aspect ratio definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Aspect ratio specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Standard portrait (9:16) for stories and reels
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    /// Feed portrait (4:5)
    pub const FEED_PORTRAIT: AspectRatio = AspectRatio {
        width: 4,
        height: 5,
    };

    /// Landscape (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Anamorphic scope (2.39:1)
    pub const CINEMA: AspectRatio = AspectRatio {
        width: 239,
        height: 100,
    };

    /// Create a new aspect ratio.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the aspect ratio as a decimal (width / height).
    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Aspect rounded to 4 decimals, scaled to an integer.
    ///
    /// Used as the aspect half of saliency cache keys so that `0.5625` and
    /// `0.56249999` land on the same entry.
    pub fn rounded_key(&self) -> i64 {
        rounded_aspect_key(self.as_f64())
    }

    /// Whether frames in this aspect are taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    /// Build from a decimal ratio, reduced to the smallest integer pair at
    /// 4-decimal precision.
    pub fn from_decimal(ratio: f64) -> Result<Self, AspectRatioParseError> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(AspectRatioParseError::ZeroValue);
        }
        let scaled = (ratio * 10_000.0).round() as u32;
        if scaled == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }
        let divisor = gcd(scaled, 10_000);
        Ok(Self::new(scaled / divisor, 10_000 / divisor))
    }

    /// Classify a free-form label ("portrait", "reel", "16:9 landscape").
    fn from_keyword(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|w| label.contains(w));

        if contains_any(&["portrait", "vertical", "story", "stories", "reel", "tiktok"]) {
            Some(Self::PORTRAIT)
        } else if contains_any(&["square"]) {
            Some(Self::SQUARE)
        } else if contains_any(&["instagram", "feed"]) {
            Some(Self::FEED_PORTRAIT)
        } else if contains_any(&["cinema", "scope", "anamorphic"]) {
            Some(Self::CINEMA)
        } else if contains_any(&["landscape", "wide", "youtube", "horizontal"]) {
            Some(Self::LANDSCAPE)
        } else {
            None
        }
    }
}

/// Round a decimal aspect to 4 places and scale it to an integer key.
pub fn rounded_aspect_key(ratio: f64) -> i64 {
    (ratio * 10_000.0).round() as i64
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AspectRatioParseError::InvalidFormat(s.to_string()));
        }

        if let Some((w, h)) = trimmed.split_once(':') {
            let width: f64 = w
                .trim()
                .parse()
                .map_err(|_| AspectRatioParseError::InvalidNumber(w.to_string()))?;
            let height: f64 = h
                .trim()
                .parse()
                .map_err(|_| AspectRatioParseError::InvalidNumber(h.to_string()))?;

            if width <= 0.0 || height <= 0.0 {
                return Err(AspectRatioParseError::ZeroValue);
            }

            if width.fract() == 0.0 && height.fract() == 0.0 {
                return Ok(AspectRatio::new(width as u32, height as u32));
            }
            return AspectRatio::from_decimal(width / height);
        }

        if let Ok(ratio) = trimmed.parse::<f64>() {
            return AspectRatio::from_decimal(ratio);
        }

        AspectRatio::from_keyword(trimmed)
            .ok_or_else(|| AspectRatioParseError::InvalidFormat(s.to_string()))
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

#[derive(Debug, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H', a decimal, or a label")]
    InvalidFormat(String),

    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),

    #[error("Aspect ratio values must be positive")]
    ZeroValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colon_form() {
        let ar: AspectRatio = "9:16".parse().unwrap();
        assert_eq!(ar, AspectRatio::PORTRAIT);
        assert!((ar.as_f64() - 0.5625).abs() < 1e-9);
    }

    #[test]
    fn test_parse_decimal_and_fractional_colon() {
        let ar: AspectRatio = "0.5625".parse().unwrap();
        assert_eq!(ar, AspectRatio::PORTRAIT);

        let scope: AspectRatio = "2.39:1".parse().unwrap();
        assert!((scope.as_f64() - 2.39).abs() < 1e-9);
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!("Vertical story".parse::<AspectRatio>().unwrap(), AspectRatio::PORTRAIT);
        assert_eq!("square".parse::<AspectRatio>().unwrap(), AspectRatio::SQUARE);
        assert_eq!("YouTube".parse::<AspectRatio>().unwrap(), AspectRatio::LANDSCAPE);
        assert_eq!("instagram feed".parse::<AspectRatio>().unwrap(), AspectRatio::FEED_PORTRAIT);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<AspectRatio>().is_err());
        assert!("0:16".parse::<AspectRatio>().is_err());
        assert!("banana".parse::<AspectRatio>().is_err());
        assert!("a:b".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_rounded_key_is_stable() {
        assert_eq!(rounded_aspect_key(0.5625), rounded_aspect_key(0.562_499_99));
        assert_eq!(AspectRatio::PORTRAIT.rounded_key(), 5625);
    }
}
