//! Saliency-driven crop planning.
//!
//! Reframes a still image to a target aspect ratio around its most
//! "energetic" point:
//!
//! 1. Resolve the EXIF rotation and reason in post-rotation coordinates
//! 2. Downsample to a small grayscale working copy
//! 3. Build a Sobel gradient-magnitude map, smoothed with a 3x3 box
//! 4. Use the energy peak as anchor when it stands out from the mean
//! 5. Cut the largest window of the target aspect around the anchor
//!
//! Degenerate images never fail the job: they get a centered crop with a
//! low confidence and a reason string.

use image::{imageops, DynamicImage, GenericImageView, GrayImage};
use reel_models::{Anchor, CropRect, Orientation, Rotation, SaliencyPlan};
use tracing::{debug, warn};

use super::config::SaliencyConfig;
use super::saliency_cache::{SaliencyCache, SaliencyKey};
use crate::error::{MediaError, MediaResult};
use crate::metrics;

/// Confidence given to the image center when no peak stands out.
const WEAK_PEAK_CONFIDENCE: f64 = 0.3;

/// Confidence given when no energy map could be computed at all.
const FAILED_CONFIDENCE: f64 = 0.0;

/// Confidence at the ratio threshold and at three times the threshold.
const MIN_PEAK_CONFIDENCE: f64 = 0.45;
const MAX_PEAK_CONFIDENCE: f64 = 0.98;

/// Vertical anchor band used for medium/low confidence anchors.
const ANCHOR_Y_BAND: (f64, f64) = (0.2, 0.8);

/// Gradient-magnitude map of a grayscale image.
///
/// Border pixels are zero; every interior pixel carries the 3x3 box mean of
/// the Sobel magnitude around it.
#[derive(Debug, Clone)]
pub struct EnergyMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

/// Strongest point of an energy map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyPeak {
    /// Normalized peak location (0-1)
    pub x: f64,
    pub y: f64,
    /// Peak energy over mean interior energy
    pub peak_mean_ratio: f64,
}

impl EnergyMap {
    /// Compute the energy map; `None` when the image has no interior.
    pub fn compute(gray: &GrayImage) -> Option<Self> {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return None;
        }

        let w = width as usize;
        let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f32;

        let mut gradient = vec![0f32; w * height as usize];
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
                let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
                gradient[y as usize * w + x as usize] = (gx * gx + gy * gy).sqrt();
            }
        }

        let mut values = vec![0f32; gradient.len()];
        for y in 1..height as usize - 1 {
            for x in 1..w - 1 {
                let mut sum = 0.0;
                for row in (y - 1)..=(y + 1) {
                    let start = row * w + x - 1;
                    sum += gradient[start] + gradient[start + 1] + gradient[start + 2];
                }
                values[y * w + x] = sum / 9.0;
            }
        }

        Some(Self {
            width,
            height,
            values,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Peak location and peak/mean ratio over the interior.
    ///
    /// A flat image (zero mean) reports a ratio of 0.
    pub fn peak(&self) -> EnergyPeak {
        let w = self.width as usize;
        let mut best = (0usize, 0usize, f32::MIN);
        let mut sum = 0f64;
        let mut count = 0usize;

        for y in 1..self.height as usize - 1 {
            for x in 1..w - 1 {
                let v = self.values[y * w + x];
                sum += v as f64;
                count += 1;
                if v > best.2 {
                    best = (x, y, v);
                }
            }
        }

        let mean = if count > 0 { sum / count as f64 } else { 0.0 };
        let peak_mean_ratio = if mean > f64::EPSILON {
            best.2 as f64 / mean
        } else {
            0.0
        };

        EnergyPeak {
            x: (best.0 as f64 + 0.5) / self.width as f64,
            y: (best.1 as f64 + 0.5) / self.height as f64,
            peak_mean_ratio,
        }
    }
}

/// Saliency planner with its plan cache.
#[derive(Debug)]
pub struct SaliencyPlanner {
    config: SaliencyConfig,
    cache: SaliencyCache,
}

impl SaliencyPlanner {
    pub fn new(config: SaliencyConfig) -> Self {
        let cache = SaliencyCache::new(config.cache_capacity);
        Self { config, cache }
    }

    pub fn config(&self) -> &SaliencyConfig {
        &self.config
    }

    pub fn cache(&self) -> &SaliencyCache {
        &self.cache
    }

    /// Plan the crop of a decoded image, consulting the cache first.
    ///
    /// # Errors
    /// `InvalidAspect` for a non-positive or non-finite target, and
    /// `InvalidCrop` if the computed rectangle breaks its invariants.
    pub fn plan(
        &mut self,
        image_id: &str,
        image: &DynamicImage,
        orientation: Orientation,
        target_aspect: f64,
    ) -> MediaResult<SaliencyPlan> {
        check_target_aspect(target_aspect)?;

        let key = SaliencyKey::new(image_id, target_aspect);
        if let Some(cached) = self.cache.get(&key) {
            debug!(image_id = %image_id, "Saliency cache hit");
            return Ok(cached.clone());
        }

        let plan = plan_saliency(
            &self.config,
            image_id,
            image,
            orientation.rotation(),
            target_aspect,
        );
        validate_plan(&plan, target_aspect, self.config.aspect_tolerance)?;

        self.cache.insert(key, plan.clone());
        Ok(plan)
    }

    /// Centered plan for an image whose pixels are unavailable.
    ///
    /// Not cached: the failure may be transient.
    pub fn plan_without_pixels(
        &self,
        image_id: &str,
        width: u32,
        height: u32,
        orientation: Orientation,
        target_aspect: f64,
        reason: impl Into<String>,
    ) -> MediaResult<SaliencyPlan> {
        check_target_aspect(target_aspect)?;

        let rotation = orientation.rotation();
        let (source_width, source_height) = rotation.rotated_dimensions(width, height);
        let plan = centered_fallback(
            &self.config,
            image_id,
            rotation,
            (source_width, source_height),
            target_aspect,
            reason.into(),
        );
        validate_plan(&plan, target_aspect, self.config.aspect_tolerance)?;
        Ok(plan)
    }
}

fn check_target_aspect(target_aspect: f64) -> MediaResult<()> {
    if target_aspect.is_finite() && target_aspect > 0.0 {
        Ok(())
    } else {
        Err(MediaError::InvalidAspect(format!(
            "target aspect must be positive, got {}",
            target_aspect
        )))
    }
}

/// Compute a saliency plan. Never fails; degenerate input falls back to a
/// centered crop.
pub fn plan_saliency(
    config: &SaliencyConfig,
    image_id: &str,
    image: &DynamicImage,
    rotation: Rotation,
    target_aspect: f64,
) -> SaliencyPlan {
    let (raw_width, raw_height) = image.dimensions();
    let source = rotation.rotated_dimensions(raw_width, raw_height);

    let peak = match energy_peak(image, rotation, config.working_size) {
        Ok(peak) => peak,
        Err(reason) => {
            warn!(image_id = %image_id, reason = %reason, "Energy map failed, using centered crop");
            return centered_fallback(config, image_id, rotation, source, target_aspect, reason);
        }
    };

    let (anchor, confidence, reason) = resolve_anchor(&peak, config);
    let centered_override = confidence < config.centered_override_below;

    let crop = if centered_override {
        metrics::record_saliency_fallback("weak_peak");
        centered_crop(source.0, source.1, target_aspect, config.aspect_tolerance)
    } else {
        anchored_crop(
            source.0,
            source.1,
            anchor,
            target_aspect,
            config.headroom_bias,
            config.aspect_tolerance,
        )
    };

    debug!(
        image_id = %image_id,
        confidence = confidence,
        peak_mean_ratio = peak.peak_mean_ratio,
        crop_x = crop.x,
        crop_y = crop.y,
        crop_w = crop.width,
        crop_h = crop.height,
        "Saliency plan computed"
    );

    SaliencyPlan {
        image_id: image_id.to_string(),
        rotation,
        source_width: source.0,
        source_height: source.1,
        crop,
        anchor,
        confidence,
        needs_review: confidence < config.confidence_threshold,
        centered_override,
        reason,
    }
}

/// Energy peak of an image in post-rotation coordinates.
fn energy_peak(
    image: &DynamicImage,
    rotation: Rotation,
    working_size: u32,
) -> Result<EnergyPeak, String> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(format!("zero-size image ({}x{})", width, height));
    }

    let gray = if width.max(height) > working_size {
        image.thumbnail(working_size, working_size).to_luma8()
    } else {
        image.to_luma8()
    };

    let gray = match rotation {
        Rotation::None => gray,
        Rotation::Cw90 => imageops::rotate90(&gray),
        Rotation::Cw180 => imageops::rotate180(&gray),
        Rotation::Cw270 => imageops::rotate270(&gray),
    };

    let map = EnergyMap::compute(&gray).ok_or_else(|| {
        format!(
            "working image {}x{} too small for an energy map",
            gray.width(),
            gray.height()
        )
    })?;
    Ok(map.peak())
}

/// Anchor and confidence for an energy peak.
pub fn resolve_anchor(peak: &EnergyPeak, config: &SaliencyConfig) -> (Anchor, f64, Option<String>) {
    let threshold = config.peak_mean_ratio_threshold;

    let (mut anchor, confidence, reason) = if peak.peak_mean_ratio >= threshold {
        let confidence = ratio_confidence(peak.peak_mean_ratio, threshold);
        (Anchor::new(peak.x, peak.y), confidence, None)
    } else {
        let reason = format!(
            "peak/mean ratio {:.2} below threshold {:.2}",
            peak.peak_mean_ratio, threshold
        );
        (Anchor::CENTER, WEAK_PEAK_CONFIDENCE, Some(reason))
    };

    if confidence < config.high_confidence_threshold {
        anchor.y = anchor.y.clamp(ANCHOR_Y_BAND.0, ANCHOR_Y_BAND.1);
    }

    (anchor, confidence, reason)
}

/// Map a peak/mean ratio at or above threshold onto a confidence.
fn ratio_confidence(ratio: f64, threshold: f64) -> f64 {
    let excess = (ratio - threshold) / (2.0 * threshold);
    (MIN_PEAK_CONFIDENCE + (MAX_PEAK_CONFIDENCE - MIN_PEAK_CONFIDENCE) * excess)
        .clamp(MIN_PEAK_CONFIDENCE, MAX_PEAK_CONFIDENCE)
}

fn centered_fallback(
    config: &SaliencyConfig,
    image_id: &str,
    rotation: Rotation,
    source: (u32, u32),
    target_aspect: f64,
    reason: String,
) -> SaliencyPlan {
    metrics::record_saliency_fallback("failed");
    SaliencyPlan {
        image_id: image_id.to_string(),
        rotation,
        source_width: source.0,
        source_height: source.1,
        crop: centered_crop(source.0, source.1, target_aspect, config.aspect_tolerance),
        anchor: Anchor::CENTER,
        confidence: FAILED_CONFIDENCE,
        needs_review: true,
        centered_override: true,
        reason: Some(reason),
    }
}

/// Largest centered window of the target aspect.
pub fn centered_crop(width: u32, height: u32, target_aspect: f64, tolerance: f64) -> CropRect {
    anchored_crop(width, height, Anchor::CENTER, target_aspect, 0.0, tolerance)
}

/// Largest window of the target aspect centered on `anchor`, shifted up by
/// `headroom` of its height, clamped inside the source.
pub fn anchored_crop(
    width: u32,
    height: u32,
    anchor: Anchor,
    target_aspect: f64,
    headroom: f64,
    tolerance: f64,
) -> CropRect {
    if width == 0 || height == 0 {
        return CropRect::full_frame(width, height);
    }

    let source_aspect = width as f64 / height as f64;
    if (source_aspect - target_aspect).abs() <= tolerance {
        return CropRect::full_frame(width, height);
    }

    if source_aspect > target_aspect {
        // Too wide: keep full height, cut width
        let crop_width = ((height as f64 * target_aspect).round() as u32).clamp(1, width);
        let center = anchor.x * width as f64;
        let max_x = (width - crop_width) as f64;
        let x = (center - crop_width as f64 / 2.0).round().clamp(0.0, max_x) as u32;
        CropRect::new(x, 0, crop_width, height)
    } else {
        // Too tall: keep full width, cut height
        let crop_height = ((width as f64 / target_aspect).round() as u32).clamp(1, height);
        let center = anchor.y * height as f64 - headroom * crop_height as f64;
        let max_y = (height - crop_height) as f64;
        let y = (center - crop_height as f64 / 2.0).round().clamp(0.0, max_y) as u32;
        CropRect::new(0, y, width, crop_height)
    }
}

/// Check crop invariants: inside the source and on the target aspect.
///
/// The aspect check allows the error of rounding one edge to whole pixels,
/// which only exceeds `tolerance` for crops a few dozen pixels tall.
pub fn validate_plan(plan: &SaliencyPlan, target_aspect: f64, tolerance: f64) -> MediaResult<()> {
    let (width, height) = (plan.source_width, plan.source_height);
    if width == 0 || height == 0 {
        return Ok(());
    }

    let crop = plan.crop;
    if crop.is_empty() {
        return Err(MediaError::invalid_crop(&plan.image_id, "empty crop rectangle"));
    }
    if !crop.fits_within(width, height) {
        return Err(MediaError::invalid_crop(
            &plan.image_id,
            format!(
                "crop {}x{}+{}+{} exceeds source {}x{}",
                crop.width, crop.height, crop.x, crop.y, width, height
            ),
        ));
    }

    let rounding_slack = 0.5 * (1.0 + target_aspect) / crop.height as f64;
    let error = (crop.aspect() - target_aspect).abs();
    if error > tolerance.max(rounding_slack) {
        return Err(MediaError::invalid_crop(
            &plan.image_id,
            format!(
                "crop aspect {:.4} deviates from target {:.4}",
                crop.aspect(),
                target_aspect
            ),
        ));
    }

    Ok(())
}
