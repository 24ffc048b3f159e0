//! Job processing: load photos, gather attributes, plan, optionally render.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reel_media::{
    build_render_graph, check_ffmpeg, ensure_duration, probe_video, CompositionPlan,
    CompositionPlanner, FfmpegRunner, ImageSource, PlanRequest, PlannerConfig, PlannerImage,
    RenderGraph,
};
use reel_models::{ImageAttributes, PlanImage, PlanJob, Seed};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::vision::{analyze_sequentially, mime_for_path, VisionAnalyzer, VisionImage};

/// A job file: the plan job plus optional planner overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    #[serde(flatten)]
    pub job: PlanJob,
    #[serde(default)]
    pub planner: PlannerConfig,
}

impl JobFile {
    pub async fn load(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            WorkerError::invalid_job(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> WorkerResult<Self> {
        let file: JobFile = serde_json::from_str(text)?;
        if file.job.images.is_empty() {
            return Err(WorkerError::invalid_job("job has no images"));
        }
        Ok(file)
    }
}

/// A rendered reel on disk.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedReel {
    pub path: PathBuf,
    /// Measured picture duration after any padding
    pub duration: f64,
    /// Seconds of last-frame padding added by the duration check
    pub padded_seconds: f64,
}

/// Everything the worker writes for a job.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutput {
    pub plan: CompositionPlan,
    pub render: RenderGraph,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<RenderedReel>,
}

/// An input photo read from disk.
struct LoadedImage {
    planner: PlannerImage,
    bytes: Option<Vec<u8>>,
    path: PathBuf,
}

/// Runs plan jobs.
pub struct JobProcessor {
    config: WorkerConfig,
    vision: Option<Arc<dyn VisionAnalyzer>>,
}

impl JobProcessor {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            vision: None,
        }
    }

    /// Analyzer used for images the job carries no attributes for.
    pub fn with_vision(mut self, analyzer: Arc<dyn VisionAnalyzer>) -> Self {
        self.vision = Some(analyzer);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Plan one job, and render it when configured to.
    pub async fn process(&self, job_file: JobFile) -> WorkerResult<PlanOutput> {
        let logger = JobLogger::new(&job_file.job.job_id, "plan_reel");
        let span = logger.create_span();
        let result = self.run(job_file, &logger).instrument(span).await;
        if let Err(e) = &result {
            logger.log_error(&e.to_string());
        }
        result
    }

    async fn run(&self, job_file: JobFile, logger: &JobLogger) -> WorkerResult<PlanOutput> {
        let JobFile { mut job, planner } = job_file;
        if let Some(seed) = &self.config.seed_override {
            job.seed = Seed::Text(seed.clone());
        }
        logger.log_start(&format!(
            "{} images, target {}, pack {:?}",
            job.images.len(),
            job.target_aspect,
            job.pack
        ));

        let mut loaded = Vec::with_capacity(job.images.len());
        for image in &job.images {
            loaded.push(load_image(image).await?);
        }
        let unavailable = loaded
            .iter()
            .filter(|l| matches!(l.planner.source, ImageSource::Unavailable { .. }))
            .count();
        if unavailable > 0 {
            logger.log_warning(&format!("{} images could not be decoded", unavailable));
        }

        self.fill_attributes(&mut loaded, logger).await;

        let paths: BTreeMap<String, PathBuf> = loaded
            .iter()
            .map(|l| (l.planner.id.clone(), l.path.clone()))
            .collect();
        let images = loaded.into_iter().map(|l| l.planner).collect();
        let request = PlanRequest::from_job(&job, images)?;

        let mut composer = CompositionPlanner::new(planner);
        let plan = composer.plan(&request)?;
        let graph = build_render_graph(&plan, &paths, &composer.config().motion)?;
        logger.log_stage(
            "plan",
            &format!(
                "planned {} shots, {:.2}s, {} flagged for review",
                plan.timeline.segments.len(),
                plan.timeline.total_duration,
                plan.review_ids().len()
            ),
        );

        let rendered = if self.config.render {
            Some(self.render(&job, &graph, composer.config(), logger).await?)
        } else {
            None
        };

        logger.log_completion(&format!(
            "{} shots, story ordering {}",
            plan.story.len(),
            if plan.story.ordering_accepted() {
                "accepted"
            } else {
                "rejected"
            }
        ));

        Ok(PlanOutput {
            plan,
            render: graph,
            rendered,
        })
    }

    /// Use job-provided attributes; ask the vision collaborator for the rest.
    async fn fill_attributes(&self, loaded: &mut [LoadedImage], logger: &JobLogger) {
        let pending: Vec<VisionImage> = loaded
            .iter()
            .filter(|l| l.planner.attributes.is_none())
            .filter_map(|l| {
                let bytes = l.bytes.clone()?;
                let (width, height) = upright_dimensions(&l.planner);
                Some(VisionImage {
                    id: l.planner.id.clone(),
                    bytes,
                    mime_type: mime_for_path(&l.path).to_string(),
                    width,
                    height,
                })
            })
            .collect();
        if pending.is_empty() {
            return;
        }

        let analyzer = match (&self.vision, self.config.vision_enabled) {
            (Some(analyzer), true) => analyzer,
            _ => {
                debug!(count = pending.len(), "Vision disabled, using neutral attributes");
                return;
            }
        };

        logger.log_stage("vision", &format!("describing {} images", pending.len()));
        let described =
            analyze_sequentially(analyzer.as_ref(), &pending, self.config.vision_delay).await;
        let mut by_id: BTreeMap<String, ImageAttributes> =
            described.into_iter().map(|a| (a.id.clone(), a)).collect();
        for image in loaded.iter_mut() {
            if image.planner.attributes.is_none() {
                image.planner.attributes = by_id.remove(&image.planner.id);
            }
        }
    }

    async fn render(
        &self,
        job: &PlanJob,
        graph: &RenderGraph,
        planner: &PlannerConfig,
        logger: &JobLogger,
    ) -> WorkerResult<RenderedReel> {
        check_ffmpeg()?;
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let output = self.config.work_dir.join(format!("{}.mp4", job.job_id));

        let runner = FfmpegRunner::new().with_timeout(self.config.ffmpeg_timeout.as_secs());
        logger.log_stage("render", &format!("rendering {}", output.display()));
        runner
            .run(&graph.to_command(&output))
            .await
            .map_err(|e| WorkerError::render_failed(e.to_string()))?;

        let padded_seconds =
            ensure_duration(&output, graph.expected_duration, &planner.timeline, &runner).await?;
        let measured = probe_video(&output).await?;
        logger.log_stage(
            "render",
            &format!(
                "{}x{} {:.3}s (planned {:.3}s)",
                measured.width, measured.height, measured.duration, graph.expected_duration
            ),
        );
        Ok(RenderedReel {
            path: output,
            duration: measured.duration,
            padded_seconds,
        })
    }
}

/// Read and decode one photo. Undecodable files become `Unavailable` with
/// whatever dimensions the header still yields.
async fn load_image(image: &PlanImage) -> WorkerResult<LoadedImage> {
    let path = PathBuf::from(&image.path);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(image_id = %image.id, path = %path.display(), error = %e, "Cannot read image");
            let planner = planner_image(
                image,
                ImageSource::Unavailable {
                    width: 0,
                    height: 0,
                    reason: format!("unreadable file: {}", e),
                },
            );
            return Ok(LoadedImage {
                planner,
                bytes: None,
                path,
            });
        }
    };

    let (source, bytes) = tokio::task::spawn_blocking(move || {
        let source = decode_image(&bytes);
        (source, bytes)
    })
    .await
    .map_err(|e| WorkerError::job_failed(format!("image decode task failed: {}", e)))?;

    if let ImageSource::Unavailable { reason, .. } = &source {
        warn!(image_id = %image.id, reason = %reason, "Image could not be decoded");
    }
    Ok(LoadedImage {
        planner: planner_image(image, source),
        bytes: Some(bytes),
        path,
    })
}

fn decode_image(bytes: &[u8]) -> ImageSource {
    match image::load_from_memory(bytes) {
        Ok(decoded) => ImageSource::Decoded(decoded),
        Err(e) => {
            let (width, height) = image::io::Reader::new(Cursor::new(bytes))
                .with_guessed_format()
                .ok()
                .and_then(|reader| reader.into_dimensions().ok())
                .unwrap_or((0, 0));
            ImageSource::Unavailable {
                width,
                height,
                reason: format!("decode failed: {}", e),
            }
        }
    }
}

fn planner_image(image: &PlanImage, source: ImageSource) -> PlannerImage {
    PlannerImage {
        id: image.id.clone(),
        orientation: image.orientation,
        source,
        attributes: image.attributes.clone(),
    }
}

fn upright_dimensions(image: &PlannerImage) -> (u32, u32) {
    let (width, height) = image.source.dimensions();
    image.orientation.rotation().rotated_dimensions(width, height)
}
