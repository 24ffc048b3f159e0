//! FFprobe measurement of rendered reels.
//!
//! Only the first video stream matters here. Its own duration is preferred
//! over the container's, since an audio track or muxer padding can make the
//! container look longer than the picture.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Measured properties of a rendered reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Seconds of picture
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count when the container records one
    pub frame_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
}

impl ProbeReport {
    fn into_info(self) -> MediaResult<VideoInfo> {
        let container = self
            .format
            .and_then(|f| f.duration)
            .and_then(|d| parse_seconds(&d));
        let stream = self
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::InvalidVideo("no video stream".to_string()))?;

        let fps = stream
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
            .unwrap_or(0.0);
        let duration = stream
            .duration
            .as_deref()
            .and_then(parse_seconds)
            .or(container)
            .unwrap_or(0.0);

        Ok(VideoInfo {
            duration,
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
            fps,
            frame_count: stream.nb_frames.and_then(|n| n.parse().ok()),
        })
    }
}

/// Probe the first video stream of a file.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "format=duration:stream=width,height,avg_frame_rate,r_frame_rate,duration,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }

    let report: ProbeReport = serde_json::from_slice(&output.stdout)?;
    report.into_info()
}

/// Measured picture duration in seconds.
///
/// # Errors
/// `InvalidVideo` when ffprobe reports no usable duration.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let info = probe_video(path).await?;
    if info.duration.is_finite() && info.duration > 0.0 {
        Ok(info.duration)
    } else {
        Err(MediaError::InvalidVideo(format!(
            "no usable duration ({})",
            info.duration
        )))
    }
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}

/// "30/1", "30000/1001" or "29.97". A zero denominator is unknown.
fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => s.trim().parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(json: &str) -> MediaResult<VideoInfo> {
        serde_json::from_str::<ProbeReport>(json).unwrap().into_info()
    }

    #[test]
    fn test_stream_duration_wins_over_container() {
        let info = report(
            r#"{
                "format": {"duration": "12.533000"},
                "streams": [{"width": 1080, "height": 1920, "avg_frame_rate": "30/1",
                             "r_frame_rate": "30/1", "duration": "12.033333", "nb_frames": "361"}]
            }"#,
        )
        .unwrap();
        assert!((info.duration - 12.033333).abs() < 1e-9);
        assert_eq!((info.width, info.height), (1080, 1920));
        assert_eq!(info.frame_count, Some(361));
    }

    #[test]
    fn test_container_duration_fallback() {
        let info = report(
            r#"{"format": {"duration": "8.0"},
                "streams": [{"width": 1080, "height": 1350, "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}]}"#,
        )
        .unwrap();
        assert_eq!(info.duration, 8.0);
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn test_no_video_stream() {
        assert!(matches!(
            report(r#"{"format": {"duration": "3.0"}, "streams": []}"#),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_probe_missing_file() {
        let err = tokio_test::block_on(probe_duration("/nonexistent/reel.mp4")).unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("29.97"), Some(29.97));
        assert_eq!(parse_frame_rate("0/0"), None);
    }
}
