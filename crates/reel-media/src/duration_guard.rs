//! Duration safety net for rendered reels.
//!
//! After encoding, the file is re-measured. A small shortfall is repaired by
//! cloning the last frame; a large one means the plan itself is wrong and
//! aborts the job.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::composition::TimelineConfig;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::probe::probe_duration;

/// What to do with a rendered file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationVerdict {
    /// Within tolerance (or longer than expected)
    Accept,
    /// Clone the last frame for this many seconds
    Pad { missing: f64 },
}

/// Compare a measured duration against the plan.
///
/// # Errors
/// `DurationShortfall` when the gap exceeds the padding bound.
pub fn assess_duration(
    expected: f64,
    actual: f64,
    config: &TimelineConfig,
) -> MediaResult<DurationVerdict> {
    let missing = expected - actual;
    if !missing.is_finite() {
        return Err(MediaError::internal(format!(
            "cannot compare durations {} and {}",
            expected, actual
        )));
    }
    if missing <= config.pad_tolerance_seconds {
        return Ok(DurationVerdict::Accept);
    }
    if missing > config.max_pad_seconds {
        return Err(MediaError::DurationShortfall {
            expected,
            actual,
            missing,
        });
    }
    Ok(DurationVerdict::Pad { missing })
}

/// Extend `path` in place by holding its last frame for `seconds`.
pub async fn pad_to_duration(
    path: impl AsRef<Path>,
    seconds: f64,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".mp4".to_string());
    let padded = tempfile::Builder::new()
        .prefix("reel-pad-")
        .suffix(&suffix)
        .tempfile_in(dir)?
        .into_temp_path();

    let cmd = FfmpegCommand::new(path, &padded)
        .video_filter(pad_filter(seconds))
        .video_codec("libx264")
        .preset("veryfast")
        .crf(18)
        .pixel_format("yuv420p")
        .no_audio();
    runner.run(&cmd).await?;

    padded.persist(path).map_err(|e| MediaError::Io(e.error))?;
    metrics::record_duration_pad(seconds);
    debug!(path = %path.display(), seconds = seconds, "Padded last frame");
    Ok(())
}

/// `tpad` filter cloning the final frame.
pub fn pad_filter(seconds: f64) -> String {
    format!("tpad=stop_mode=clone:stop_duration={:.3}", seconds)
}

/// Measure a rendered file and pad it if it fell short. Returns the padded
/// seconds (0 when nothing was needed).
pub async fn ensure_duration(
    path: impl AsRef<Path>,
    expected: f64,
    config: &TimelineConfig,
    runner: &FfmpegRunner,
) -> MediaResult<f64> {
    let path = path.as_ref();
    let actual = probe_duration(path).await?;

    match assess_duration(expected, actual, config)? {
        DurationVerdict::Accept => {
            debug!(expected = expected, actual = actual, "Rendered duration accepted");
            Ok(0.0)
        }
        DurationVerdict::Pad { missing } => {
            warn!(
                expected = expected,
                actual = actual,
                missing = missing,
                "Rendered reel is short, cloning last frame"
            );
            pad_to_duration(path, missing, runner).await?;
            info!(path = %path.display(), padded = missing, "Duration repaired");
            Ok(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_tolerance_is_accepted() {
        let config = TimelineConfig::default();
        assert_eq!(
            assess_duration(12.0, 11.9, &config).unwrap(),
            DurationVerdict::Accept
        );
        assert_eq!(
            assess_duration(12.0, 12.4, &config).unwrap(),
            DurationVerdict::Accept
        );
    }

    #[test]
    fn test_small_shortfall_is_padded() {
        let config = TimelineConfig::default();
        match assess_duration(12.0, 11.5, &config).unwrap() {
            DurationVerdict::Pad { missing } => assert!((missing - 0.5).abs() < 1e-9),
            other => panic!("expected pad, got {:?}", other),
        }
    }

    #[test]
    fn test_large_shortfall_raises() {
        let config = TimelineConfig::default();
        let err = assess_duration(12.0, 8.0, &config).unwrap_err();
        assert!(matches!(err, MediaError::DurationShortfall { .. }));
        assert!(err.is_planning_bug());
    }

    #[test]
    fn test_nan_is_internal_error() {
        let config = TimelineConfig::default();
        assert!(matches!(
            assess_duration(12.0, f64::NAN, &config),
            Err(MediaError::Internal(_))
        ));
    }

    #[test]
    fn test_pad_filter() {
        assert_eq!(pad_filter(0.5), "tpad=stop_mode=clone:stop_duration=0.500");
    }

    #[tokio::test]
    async fn test_pad_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = pad_to_duration(dir.path().join("gone.mp4"), 0.5, &FfmpegRunner::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
