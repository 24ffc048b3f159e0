//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Models tried in order until one answers.
const DEFAULT_VISION_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Call the vision collaborator for images without attributes
    pub vision_enabled: bool,
    /// Vision models in fallback order
    pub vision_models: Vec<String>,
    /// Fixed pause between consecutive vision calls
    pub vision_delay: Duration,
    /// Per-request vision timeout
    pub vision_timeout: Duration,
    /// Render the plan with FFmpeg after planning
    pub render: bool,
    /// FFmpeg timeout for the render and the padding pass
    pub ffmpeg_timeout: Duration,
    /// Directory for rendered output
    pub work_dir: PathBuf,
    /// Override for the job's seed
    pub seed_override: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            vision_enabled: true,
            vision_models: DEFAULT_VISION_MODELS.iter().map(|m| m.to_string()).collect(),
            vision_delay: Duration::from_millis(1500),
            vision_timeout: Duration::from_secs(60),
            render: false,
            ffmpeg_timeout: Duration::from_secs(600),
            work_dir: PathBuf::from("/tmp/reel"),
            seed_override: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup; unset or unparsable keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            vision_enabled: lookup("REEL_VISION_ENABLED")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.vision_enabled),
            vision_models: lookup("REEL_VISION_MODELS")
                .map(|s| {
                    s.split(',')
                        .map(|m| m.trim().to_string())
                        .filter(|m| !m.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|models| !models.is_empty())
                .unwrap_or(defaults.vision_models),
            vision_delay: Duration::from_millis(
                lookup("REEL_VISION_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1500),
            ),
            vision_timeout: Duration::from_secs(
                lookup("REEL_VISION_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            render: lookup("REEL_RENDER")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.render),
            ffmpeg_timeout: Duration::from_secs(
                lookup("REEL_FFMPEG_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            work_dir: lookup("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            seed_override: lookup("REEL_SEED").filter(|s| !s.trim().is_empty()),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = WorkerConfig::from_lookup(|_| None);
        assert!(config.vision_enabled);
        assert!(!config.render);
        assert_eq!(config.vision_delay, Duration::from_millis(1500));
        assert_eq!(config.vision_models[0], "gemini-2.5-flash");
    }

    #[test]
    fn test_overrides() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("REEL_VISION_ENABLED", "off"),
            ("REEL_VISION_MODELS", "model-a, model-b,"),
            ("REEL_VISION_DELAY_MS", "250"),
            ("REEL_RENDER", "true"),
            ("REEL_FFMPEG_TIMEOUT", "90"),
            ("REEL_WORK_DIR", "/data/reels"),
            ("REEL_SEED", "trip-2024"),
        ]));
        assert!(!config.vision_enabled);
        assert_eq!(config.vision_models, vec!["model-a", "model-b"]);
        assert_eq!(config.vision_delay, Duration::from_millis(250));
        assert!(config.render);
        assert_eq!(config.ffmpeg_timeout, Duration::from_secs(90));
        assert_eq!(config.work_dir, PathBuf::from("/data/reels"));
        assert_eq!(config.seed_override.as_deref(), Some("trip-2024"));
    }

    #[test]
    fn test_garbage_keeps_defaults() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("REEL_VISION_DELAY_MS", "soon"),
            ("REEL_RENDER", "maybe"),
            ("REEL_VISION_MODELS", " , "),
        ]));
        assert_eq!(config.vision_delay, Duration::from_millis(1500));
        assert!(!config.render);
        assert_eq!(config.vision_models.len(), 3);
    }
}
