//! FFmpeg filter graph for rendering a composition plan.
//!
//! Every shot is a looped still input trimmed to its segment length. Each
//! goes through `crop -> scale -> zoompan`, and the per-shot streams are
//! joined left to right: `concat` at cuts and holds, `xfade` at dissolves
//! and dips. The zoompan expressions re-apply the motion sampler's clamps
//! so the rendered window never leaves the source.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use reel_models::{
    Easing, MotionSpec, Rotation, SaliencyPlan, TimelineSegment, TransitionKind,
};

use serde::Serialize;

use crate::command::{format_number, FfmpegCommand};
use crate::composition::{CompositionPlan, MotionConfig, PackProfile};
use crate::error::{MediaError, MediaResult};

/// Label of the final video stream.
pub const OUTPUT_LABEL: &str = "vout";

/// One looped still input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderInput {
    pub path: PathBuf,
    /// Seconds of looped frames to read
    pub duration: f64,
}

/// Inputs plus the `filter_complex` graph that renders a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderGraph {
    pub inputs: Vec<RenderInput>,
    pub filter_complex: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub expected_duration: f64,
}

impl RenderGraph {
    /// FFmpeg command rendering this graph to `output`.
    pub fn to_command(&self, output: impl AsRef<Path>) -> FfmpegCommand {
        let fps = format_number(self.fps);
        let mut cmd = FfmpegCommand::for_output(output);
        for input in &self.inputs {
            cmd = cmd.input_with_args(
                [
                    "-noautorotate".to_string(),
                    "-loop".to_string(),
                    "1".to_string(),
                    "-framerate".to_string(),
                    fps.clone(),
                    "-t".to_string(),
                    format!("{:.4}", input.duration),
                ],
                &input.path,
            );
        }
        cmd.filter_complex(self.filter_complex.clone())
            .map(format!("[{}]", OUTPUT_LABEL))
            .frame_rate(self.fps)
            .video_codec("libx264")
            .preset("medium")
            .crf(18)
            .pixel_format("yuv420p")
            .no_audio()
    }
}

/// Clamp limits baked into the zoompan expressions.
#[derive(Debug, Clone, Copy)]
pub struct PanBounds {
    pub ceiling: f64,
    pub margin: f64,
    pub max_pan_fraction: f64,
}

impl PanBounds {
    pub fn new(config: &MotionConfig, ceiling: f64) -> Self {
        Self {
            ceiling,
            margin: config.safety_margin_px,
            max_pan_fraction: config.max_pan_fraction,
        }
    }
}

/// Build the render graph for a plan.
///
/// # Errors
/// `InvalidJob` when a shot has no source path, `TimelineInvariant` when the
/// plan's shots, motions and segments disagree.
pub fn build_render_graph(
    plan: &CompositionPlan,
    paths: &BTreeMap<String, PathBuf>,
    motion_config: &MotionConfig,
) -> MediaResult<RenderGraph> {
    let segments = &plan.timeline.segments;
    if segments.is_empty() {
        return Err(MediaError::timeline("plan has no segments"));
    }
    if plan.motions.len() != segments.len() {
        return Err(MediaError::timeline(format!(
            "{} motions for {} segments",
            plan.motions.len(),
            segments.len()
        )));
    }

    let fps = plan.timeline.fps;
    let bounds = PanBounds::new(motion_config, PackProfile::for_pack(plan.pack).ceiling);
    let mut inputs = Vec::with_capacity(segments.len());
    let mut chains = Vec::with_capacity(segments.len() * 2);

    for (index, (segment, motion)) in segments.iter().zip(&plan.motions).enumerate() {
        let path = paths.get(&segment.shot_id).ok_or_else(|| {
            MediaError::invalid_job(format!("no source path for {}", segment.shot_id))
        })?;
        let saliency = plan.saliency_for(&segment.shot_id).ok_or_else(|| {
            MediaError::internal(format!("no saliency plan for {}", segment.shot_id))
        })?;
        inputs.push(RenderInput {
            path: path.clone(),
            duration: segment.duration,
        });
        chains.push(shot_chain(
            index,
            saliency,
            motion,
            segment,
            fps,
            (plan.frame_width, plan.frame_height),
            &bounds,
        ));
    }

    chains.extend(join_chains(segments));

    Ok(RenderGraph {
        inputs,
        filter_complex: chains.join(";"),
        fps,
        width: plan.frame_width,
        height: plan.frame_height,
        expected_duration: plan.timeline.total_duration,
    })
}

/// Filter chain turning input `index` into stream `[v{index}]`.
pub fn shot_chain(
    index: usize,
    saliency: &SaliencyPlan,
    motion: &MotionSpec,
    segment: &TimelineSegment,
    fps: f64,
    frame: (u32, u32),
    bounds: &PanBounds,
) -> String {
    let (width, height) = frame;
    let crop = &saliency.crop;
    let motion_frames = (segment.motion_duration * fps).round().max(1.0) as u32;
    let total_frames = segment.frame_count(fps);

    format!(
        "[{index}:v]{rotate}crop={cw}:{ch}:{cx}:{cy},scale={w}:{h},setsar=1,\
         zoompan=z='{z}':x='{x}':y='{y}':d=1:s={w}x{h}:fps={fps},\
         trim=end_frame={frames},setpts=PTS-STARTPTS[v{index}]",
        index = index,
        rotate = rotate_filter(saliency.rotation),
        cw = crop.width,
        ch = crop.height,
        cx = crop.x,
        cy = crop.y,
        w = width,
        h = height,
        z = zoom_expression(motion, motion_frames, bounds),
        x = pan_expression(motion, motion_frames, Axis::X, width, bounds),
        y = pan_expression(motion, motion_frames, Axis::Y, height, bounds),
        fps = format_number(fps),
        frames = total_frames,
    )
}

/// Transposition that displays an EXIF-rotated source upright.
pub fn rotate_filter(rotation: Rotation) -> &'static str {
    match rotation {
        Rotation::None => "",
        Rotation::Cw90 => "transpose=1,",
        Rotation::Cw180 => "hflip,vflip,",
        Rotation::Cw270 => "transpose=2,",
    }
}

/// Chains joining `[v0]..[vN]` into `[vout]`.
fn join_chains(segments: &[TimelineSegment]) -> Vec<String> {
    let mut chains = Vec::with_capacity(segments.len());
    let mut current = "v0".to_string();

    for (index, segment) in segments.iter().enumerate().take(segments.len() - 1) {
        let next = format!("v{}", index + 1);
        let joined = format!("j{}", index + 1);
        let incoming_start = segments[index + 1].start;

        let filter = match &segment.transition_to_next {
            Some(t) if t.overlap() > 0.0 => {
                let style = if t.kind == TransitionKind::DipToBlack {
                    "fadeblack"
                } else {
                    "fade"
                };
                format!(
                    "xfade=transition={}:duration={:.4}:offset={:.4}",
                    style,
                    t.overlap(),
                    incoming_start
                )
            }
            _ => "concat=n=2:v=1:a=0".to_string(),
        };
        chains.push(format!("[{}][{}]{}[{}]", current, next, filter, joined));
        current = joined;
    }

    chains.push(format!("[{}]format=yuv420p[{}]", current, OUTPUT_LABEL));
    chains
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    X,
    Y,
}

/// Motion progress at output frame `on`, frozen once the motion ends.
fn progress_expression(motion_frames: u32) -> String {
    if motion_frames <= 1 {
        "1".to_string()
    } else {
        format!("min(on/{},1)", motion_frames - 1)
    }
}

fn eased_expression(easing: Easing, progress: &str) -> String {
    match easing {
        Easing::Linear => progress.to_string(),
        Easing::SmoothStep => format!("({p})*({p})*(3-2*({p}))", p = progress),
        Easing::Sine => format!("(0.5-0.5*cos(PI*({})))", progress),
    }
}

fn zoom_expression(motion: &MotionSpec, motion_frames: u32, bounds: &PanBounds) -> String {
    if (motion.end_zoom - motion.start_zoom).abs() < 1e-9 {
        return format!("{:.6}", motion.start_zoom.clamp(1.0, bounds.ceiling));
    }
    let eased = eased_expression(motion.easing, &progress_expression(motion_frames));
    format!(
        "clip({:.6}+{:.6}*{},1,{:.6})",
        motion.start_zoom,
        motion.end_zoom - motion.start_zoom,
        eased,
        bounds.ceiling
    )
}

/// Top-left of the zoompan window on one axis.
///
/// The normalized pan becomes a pixel translation, clamped to the same
/// bound as the motion sampler, then divided by zoom to land in input
/// pixels.
fn pan_expression(
    motion: &MotionSpec,
    motion_frames: u32,
    axis: Axis,
    frame_dim: u32,
    bounds: &PanBounds,
) -> String {
    let (dim_var, start, end) = match axis {
        Axis::X => ("iw", motion.start_pan_x, motion.end_pan_x),
        Axis::Y => ("ih", motion.start_pan_y, motion.end_pan_y),
    };
    let centered = format!("({d}-{d}/zoom)/2", d = dim_var);
    let noise = match (axis, motion.noise) {
        (Axis::X, Some(noise)) if noise.amplitude > 0.0 => Some(noise),
        _ => None,
    };
    if start.abs() < 1e-12 && end.abs() < 1e-12 && noise.is_none() {
        return centered;
    }

    let progress = progress_expression(motion_frames);
    let eased = eased_expression(motion.easing, &progress);
    let mut pan = format!("{:.6}+{:.6}*{}", start, end - start, eased);
    if let Some(noise) = noise {
        pan.push_str(&format!(
            "+{:.6}*sin(PI*{p})*sin({:.6}*{p}+{:.6})",
            noise.amplitude,
            2.0 * PI * noise.frequency,
            noise.phase,
            p = progress
        ));
    }

    let dim = frame_dim as f64;
    let limit = format!(
        "min(max({dim:.1}*(zoom-1)/2-{margin:.3},0),{backstop:.3})",
        dim = dim,
        margin = bounds.margin,
        backstop = bounds.max_pan_fraction * dim
    );
    format!(
        "{}+clip(({})*{:.1},-{lim},{lim})/zoom",
        centered,
        pan,
        dim,
        lim = limit
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{CropRect, MotionNoise, MotionPreset, Transition, TransitionReason};

    fn bounds() -> PanBounds {
        PanBounds {
            ceiling: 1.035,
            margin: 1.5,
            max_pan_fraction: 0.02,
        }
    }

    fn segment(id: &str, start: f64, duration: f64, next: Option<Transition>) -> TimelineSegment {
        TimelineSegment {
            shot_id: id.into(),
            start,
            duration,
            motion_duration: duration,
            transition_to_next: next,
        }
    }

    #[test]
    fn test_still_shot_is_centered() {
        let still = MotionSpec::still(2.0);
        assert_eq!(zoom_expression(&still, 60, &bounds()), "1.000000");
        assert_eq!(pan_expression(&still, 60, Axis::X, 1080, &bounds()), "(iw-iw/zoom)/2");
    }

    #[test]
    fn test_push_in_zoom_is_eased_and_clipped() {
        let push = MotionSpec {
            preset: MotionPreset::PushIn,
            end_zoom: 1.03,
            easing: Easing::SmoothStep,
            ..MotionSpec::still(2.0)
        };
        let expr = zoom_expression(&push, 60, &bounds());
        assert!(expr.starts_with("clip(1.000000+0.030000*"));
        assert!(expr.contains("min(on/59,1)"));
        assert!(expr.ends_with(",1,1.035000)"));
    }

    #[test]
    fn test_drift_pan_is_clamped() {
        let drift = MotionSpec {
            preset: MotionPreset::DriftRight,
            start_zoom: 1.03,
            end_zoom: 1.03,
            end_pan_x: 0.012,
            noise: Some(MotionNoise {
                amplitude: 0.001,
                frequency: 1.0,
                phase: 0.0,
            }),
            ..MotionSpec::still(3.0)
        };
        let x = pan_expression(&drift, 90, Axis::X, 1080, &bounds());
        assert!(x.starts_with("(iw-iw/zoom)/2+clip("));
        assert!(x.contains("sin(PI*min(on/89,1))"));
        assert!(x.contains("21.600"));
        let y = pan_expression(&drift, 90, Axis::Y, 1920, &bounds());
        assert_eq!(y, "(ih-ih/zoom)/2");
    }

    #[test]
    fn test_rotation_prefixes() {
        assert_eq!(rotate_filter(Rotation::None), "");
        assert_eq!(rotate_filter(Rotation::Cw90), "transpose=1,");
        assert_eq!(rotate_filter(Rotation::Cw270), "transpose=2,");
    }

    #[test]
    fn test_joins_use_concat_and_xfade() {
        let segments = vec![
            segment("a", 0.0, 2.0, Some(Transition::cut(0, TransitionReason::IntroCut))),
            segment(
                "b",
                2.0,
                2.0,
                Some(Transition::dissolve(1, 0.4, TransitionReason::DevelopmentSoftDissolve)),
            ),
            segment(
                "c",
                3.6,
                2.0,
                Some(Transition::dip_to_black(2, 0.3, TransitionReason::ResolveDipToBlack)),
            ),
            segment("d", 5.3, 2.0, None),
        ];
        let chains = join_chains(&segments);
        assert_eq!(chains.len(), 4);
        assert_eq!(chains[0], "[v0][v1]concat=n=2:v=1:a=0[j1]");
        assert_eq!(
            chains[1],
            "[j1][v2]xfade=transition=fade:duration=0.4000:offset=3.6000[j2]"
        );
        assert!(chains[2].contains("transition=fadeblack"));
        assert!(chains[2].contains("offset=5.3000"));
        assert_eq!(chains[3], "[j3]format=yuv420p[vout]");
    }

    #[test]
    fn test_single_segment_join() {
        let chains = join_chains(&[segment("a", 0.0, 2.0, None)]);
        assert_eq!(chains, vec!["[v0]format=yuv420p[vout]".to_string()]);
    }

    #[test]
    fn test_shot_chain_applies_crop_and_frames() {
        let saliency = SaliencyPlan {
            image_id: "a".into(),
            rotation: Rotation::Cw90,
            source_width: 3000,
            source_height: 4000,
            crop: CropRect::new(375, 0, 2250, 4000),
            anchor: reel_models::Anchor::CENTER,
            confidence: 0.9,
            needs_review: false,
            centered_override: false,
            reason: None,
        };
        let chain = shot_chain(
            2,
            &saliency,
            &MotionSpec::still(2.5),
            &segment("a", 0.0, 2.5, None),
            30.0,
            (1080, 1920),
            &bounds(),
        );
        assert!(chain.starts_with("[2:v]transpose=1,crop=2250:4000:375:0,scale=1080:1920"));
        assert!(chain.contains("s=1080x1920:fps=30"));
        assert!(chain.contains("trim=end_frame=75"));
        assert!(chain.ends_with("[v2]"));
    }
}
