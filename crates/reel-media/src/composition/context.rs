//! Planner context: one explicit value that owns configuration and the
//! saliency cache, and runs the five planning stages for a job.
//!
//! The context is `&mut self` throughout. A host serving concurrent jobs
//! should hold one context per job or wrap it in a mutex.

use std::collections::{BTreeMap, HashSet};

use image::DynamicImage;
use reel_models::{
    AspectRatio, ImageAttributes, JobId, MotionPack, MotionSpec, Orientation, PlanJob,
    SaliencyPlan, Seed, StoryLock, Timeline, Transition,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::PlannerConfig;
use super::motion::{validate_motion, MotionGenerator};
use super::saliency::SaliencyPlanner;
use super::saliency_cache::SaliencyCache;
use super::story_lock::{lock_story, StoryRequest};
use super::timeline::TimelineAssembler;
use super::transitions::{TransitionSelector, TransitionShot};
use crate::error::{MediaError, MediaResult};

/// Pixels of one input image, or why they are missing.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Decoded(DynamicImage),
    /// Decoding failed; dimensions come from the header or the job
    Unavailable {
        width: u32,
        height: u32,
        reason: String,
    },
}

impl ImageSource {
    /// Stored (pre-rotation) dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ImageSource::Decoded(image) => (image.width(), image.height()),
            ImageSource::Unavailable { width, height, .. } => (*width, *height),
        }
    }
}

/// One image handed to the planner.
#[derive(Debug, Clone)]
pub struct PlannerImage {
    pub id: String,
    pub orientation: Orientation,
    pub source: ImageSource,
    /// Vision attributes; neutral defaults are used when absent
    pub attributes: Option<ImageAttributes>,
}

impl PlannerImage {
    pub fn decoded(id: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            id: id.into(),
            orientation: Orientation::UPRIGHT,
            source: ImageSource::Decoded(image),
            attributes: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_attributes(mut self, attributes: ImageAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Everything one planning run needs besides configuration.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub job_id: JobId,
    pub images: Vec<PlannerImage>,
    pub target_aspect: AspectRatio,
    pub pack: MotionPack,
    pub seed: Seed,
    pub candidate_order: Option<Vec<String>>,
    pub role_hints: BTreeMap<String, String>,
    pub target_duration: Option<f64>,
}

impl PlanRequest {
    pub fn new(images: Vec<PlannerImage>, target_aspect: AspectRatio) -> Self {
        Self {
            job_id: JobId::new(),
            images,
            target_aspect,
            pack: MotionPack::default(),
            seed: Seed::default(),
            candidate_order: None,
            role_hints: BTreeMap::new(),
            target_duration: None,
        }
    }

    /// Build from a job description and its loaded images.
    ///
    /// # Errors
    /// `InvalidAspect` when the job's target aspect does not parse.
    pub fn from_job(job: &PlanJob, images: Vec<PlannerImage>) -> MediaResult<Self> {
        let target_aspect: AspectRatio = job
            .target_aspect
            .parse()
            .map_err(|e| MediaError::InvalidAspect(format!("{}: {}", job.target_aspect, e)))?;

        Ok(Self {
            job_id: job.job_id.clone(),
            images,
            target_aspect,
            pack: job.pack,
            seed: job.seed.clone(),
            candidate_order: job.candidate_order.clone(),
            role_hints: job.role_hints.clone(),
            target_duration: job.target_duration,
        })
    }

    pub fn with_pack(mut self, pack: MotionPack) -> Self {
        self.pack = pack;
        self
    }

    pub fn with_seed(mut self, seed: impl Into<Seed>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_candidate_order(mut self, order: Vec<String>) -> Self {
        self.candidate_order = Some(order);
        self
    }

    pub fn with_role_hint(mut self, image_id: impl Into<String>, hint: impl Into<String>) -> Self {
        self.role_hints.insert(image_id.into(), hint.into());
        self
    }

    pub fn with_target_duration(mut self, seconds: f64) -> Self {
        self.target_duration = Some(seconds);
        self
    }
}

/// The full composition plan of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionPlan {
    pub job_id: JobId,
    pub target_aspect: AspectRatio,
    pub frame_width: u32,
    pub frame_height: u32,
    pub pack: MotionPack,
    /// Crop plans for every input image, in input order
    pub saliency: Vec<SaliencyPlan>,
    pub story: StoryLock,
    /// One motion per kept shot, in shot order
    pub motions: Vec<MotionSpec>,
    pub timeline: Timeline,
}

impl CompositionPlan {
    pub fn saliency_for(&self, image_id: &str) -> Option<&SaliencyPlan> {
        self.saliency.iter().find(|p| p.image_id == image_id)
    }

    /// Transitions as placed on the timeline (overlaps fitted to frames).
    pub fn transitions(&self) -> Vec<&Transition> {
        self.timeline.transitions().collect()
    }

    /// Images whose crop should be looked at by a person.
    pub fn review_ids(&self) -> Vec<&str> {
        self.saliency
            .iter()
            .filter(|p| p.needs_review)
            .map(|p| p.image_id.as_str())
            .collect()
    }

    pub fn expected_duration(&self) -> f64 {
        self.timeline.total_duration
    }
}

/// Output frame size for an aspect, with the short edge fixed and both
/// dimensions even.
pub fn output_frame_size(aspect: f64, short_edge: u32) -> (u32, u32) {
    let short = even(short_edge as f64);
    if aspect < 1.0 {
        (short, even(short as f64 / aspect))
    } else {
        (even(short as f64 * aspect), short)
    }
}

fn even(value: f64) -> u32 {
    (((value / 2.0).round() as u32) * 2).max(2)
}

/// Planner context owning configuration and the saliency cache.
#[derive(Debug)]
pub struct CompositionPlanner {
    config: PlannerConfig,
    saliency: SaliencyPlanner,
}

impl CompositionPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        let saliency = SaliencyPlanner::new(config.saliency.clone());
        Self { config, saliency }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn saliency_cache(&self) -> &SaliencyCache {
        self.saliency.cache()
    }

    /// Plan a job end to end.
    ///
    /// # Errors
    /// `InvalidJob` for an empty or duplicated image set, `InvalidAspect`
    /// for an unusable target, and the planning-bug variants when an
    /// invariant check fails.
    pub fn plan(&mut self, request: &PlanRequest) -> MediaResult<CompositionPlan> {
        validate_images(&request.images)?;
        let target_aspect = request.target_aspect.as_f64();
        if !target_aspect.is_finite() || target_aspect <= 0.0 {
            return Err(MediaError::InvalidAspect(format!(
                "{}:{}",
                request.target_aspect.width, request.target_aspect.height
            )));
        }

        // Saliency
        let mut saliency = Vec::with_capacity(request.images.len());
        for image in &request.images {
            let plan = match &image.source {
                ImageSource::Decoded(pixels) => {
                    self.saliency
                        .plan(&image.id, pixels, image.orientation, target_aspect)?
                }
                ImageSource::Unavailable {
                    width,
                    height,
                    reason,
                } => {
                    warn!(image_id = %image.id, reason = %reason, "Image pixels unavailable, centering crop");
                    self.saliency.plan_without_pixels(
                        &image.id,
                        *width,
                        *height,
                        image.orientation,
                        target_aspect,
                        reason.clone(),
                    )?
                }
            };
            saliency.push(plan);
        }

        // Story lock
        let image_ids: Vec<String> = request.images.iter().map(|i| i.id.clone()).collect();
        let attributes: Vec<ImageAttributes> = request
            .images
            .iter()
            .map(|image| {
                image.attributes.clone().unwrap_or_else(|| {
                    let (width, height) = image.source.dimensions();
                    ImageAttributes::neutral(image.id.as_str(), width, height)
                })
            })
            .collect();
        let story = lock_story(&StoryRequest {
            image_ids: &image_ids,
            attributes: &attributes,
            candidate_order: request.candidate_order.as_deref(),
            role_hints: &request.role_hints,
            gallery_mode: self.config.gallery_mode,
        });
        if story.is_empty() {
            return Err(MediaError::internal("story lock kept no shots"));
        }

        // Motion
        let shot_count = story.len();
        let (frame_width, frame_height) =
            output_frame_size(target_aspect, self.config.timeline.output_short_edge);
        let generator =
            MotionGenerator::new(self.config.motion.clone(), request.pack, request.seed.clone());
        let mut motions =
            generator.generate_sequence(shot_count, self.config.timeline.shot_seconds);

        // Transitions
        let transition_shots = story
            .shots
            .iter()
            .zip(&motions)
            .map(|(shot, motion)| {
                let portrait = saliency
                    .iter()
                    .find(|p| p.image_id == shot.image_id)
                    .is_some_and(SaliencyPlan::is_portrait_source);
                TransitionShot {
                    shot,
                    motion,
                    portrait,
                }
            })
            .collect::<Vec<_>>();
        let transitions =
            TransitionSelector::new(self.config.transitions.clone()).select(&transition_shots, &story);

        // Timeline
        let assembler = TimelineAssembler::new(self.config.timeline.clone());
        let base = assembler.base_durations(shot_count, &transitions, request.target_duration)?;
        let shot_ids: Vec<String> = story.shots.iter().map(|s| s.image_id.clone()).collect();
        let timeline = assembler.assemble(&shot_ids, &base, &transitions)?;

        let sampler = generator.sampler(frame_width, frame_height);
        for (index, (motion, segment)) in motions.iter_mut().zip(&timeline.segments).enumerate() {
            motion.hold_duration = segment.motion_duration;
            validate_motion(motion, &sampler, self.config.motion.validation_samples, index)?;
        }

        debug!(
            job_id = %request.job_id,
            cache_entries = self.saliency.cache().len(),
            "Planning stages complete"
        );
        info!(
            job_id = %request.job_id,
            shots = shot_count,
            dropped = story.dropped_ids.len(),
            transitions = timeline.transition_count(),
            total_duration = timeline.total_duration,
            "Composition plan ready"
        );

        Ok(CompositionPlan {
            job_id: request.job_id.clone(),
            target_aspect: request.target_aspect,
            frame_width,
            frame_height,
            pack: request.pack,
            saliency,
            story,
            motions,
            timeline,
        })
    }
}

fn validate_images(images: &[PlannerImage]) -> MediaResult<()> {
    if images.is_empty() {
        return Err(MediaError::invalid_job("job has no images"));
    }
    let mut seen = HashSet::with_capacity(images.len());
    for image in images {
        if image.id.trim().is_empty() {
            return Err(MediaError::invalid_job("image id is empty"));
        }
        if !seen.insert(image.id.as_str()) {
            return Err(MediaError::invalid_job(format!(
                "image id {} appears more than once",
                image.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([90])))
    }

    #[test]
    fn test_output_frame_size() {
        assert_eq!(output_frame_size(9.0 / 16.0, 1080), (1080, 1920));
        assert_eq!(output_frame_size(16.0 / 9.0, 1080), (1920, 1080));
        assert_eq!(output_frame_size(1.0, 1080), (1080, 1080));
        assert_eq!(output_frame_size(0.8, 1080), (1080, 1350));
        let (w, h) = output_frame_size(2.39, 720);
        assert_eq!(h, 720);
        assert_eq!(w % 2, 0);
    }

    #[test]
    fn test_empty_job_is_rejected() {
        let mut planner = CompositionPlanner::new(PlannerConfig::default());
        let request = PlanRequest::new(Vec::new(), AspectRatio::PORTRAIT);
        let err = planner.plan(&request).unwrap_err();
        assert!(matches!(err, MediaError::InvalidJob(_)));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut planner = CompositionPlanner::new(PlannerConfig::default());
        let request = PlanRequest::new(
            vec![
                PlannerImage::decoded("a", image(64, 48)),
                PlannerImage::decoded("a", image(64, 48)),
            ],
            AspectRatio::PORTRAIT,
        );
        assert!(matches!(planner.plan(&request), Err(MediaError::InvalidJob(_))));
    }

    #[test]
    fn test_unavailable_pixels_fall_back_to_center() {
        let mut planner = CompositionPlanner::new(PlannerConfig::default());
        let request = PlanRequest::new(
            vec![
                PlannerImage::decoded("a", image(64, 48)),
                PlannerImage {
                    id: "b".into(),
                    orientation: Orientation(6),
                    source: ImageSource::Unavailable {
                        width: 400,
                        height: 300,
                        reason: "truncated file".into(),
                    },
                    attributes: None,
                },
            ],
            AspectRatio::SQUARE,
        );
        let plan = planner.plan(&request).unwrap();
        let fallback = plan.saliency_for("b").unwrap();
        assert!(fallback.needs_review);
        assert_eq!((fallback.source_width, fallback.source_height), (300, 400));
        assert!(plan.review_ids().contains(&"b"));
        // Uncached: only the decoded image lands in the cache
        assert_eq!(planner.saliency_cache().len(), 1);
    }

    #[test]
    fn test_motion_holds_match_segments() {
        let mut planner = CompositionPlanner::new(PlannerConfig::default());
        let images = (0..4)
            .map(|i| PlannerImage::decoded(format!("img-{}", i), image(96, 64)))
            .collect();
        let plan = planner
            .plan(&PlanRequest::new(images, AspectRatio::PORTRAIT).with_seed("holds"))
            .unwrap();
        assert_eq!(plan.motions.len(), plan.timeline.segments.len());
        for (motion, segment) in plan.motions.iter().zip(&plan.timeline.segments) {
            assert!((motion.hold_duration - segment.motion_duration).abs() < 1e-9);
        }
        assert_eq!((plan.frame_width, plan.frame_height), (1080, 1920));
    }

    #[test]
    fn test_from_job_rejects_bad_aspect() {
        let job: PlanJob = serde_json::from_str(
            r#"{"images": [{"id": "a", "path": "a.jpg"}], "target_aspect": "tall-ish"}"#,
        )
        .unwrap();
        let err = PlanRequest::from_job(&job, Vec::new()).unwrap_err();
        assert!(matches!(err, MediaError::InvalidAspect(_)));
    }
}
