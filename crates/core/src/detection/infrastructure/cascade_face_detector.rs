//! Frontal face detector backed by `rustface`'s funnel-structured cascade.
//!
//! Runs one full cascade pass per frame on the luma plane and reports every
//! face above the score threshold, best first.

use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Smallest window the cascade model accepts.
const MIN_WINDOW: u32 = 20;

#[derive(Clone, Debug, PartialEq)]
pub struct CascadeConfig {
    pub min_face_size: u32,
    pub score_thresh: f64,
    pub pyramid_scale_factor: f32,
    pub slide_step: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            min_face_size: 20,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.8,
            slide_step: 4,
        }
    }
}

impl CascadeConfig {
    /// `rustface` panics on out-of-range settings, so reject them up front.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_face_size < MIN_WINDOW {
            return Err(format!(
                "Minimum face size must be at least {MIN_WINDOW}, got {}",
                self.min_face_size
            ));
        }
        if self.score_thresh <= 0.0 {
            return Err(format!(
                "Score threshold must be positive, got {}",
                self.score_thresh
            ));
        }
        if !(0.01..=0.99).contains(&self.pyramid_scale_factor) {
            return Err(format!(
                "Pyramid scale factor must be between 0.01 and 0.99, got {}",
                self.pyramid_scale_factor
            ));
        }
        if self.slide_step == 0 {
            return Err("Slide step must be positive".to_string());
        }
        Ok(())
    }
}

pub struct CascadeFaceDetector {
    detector: Box<dyn rustface::Detector>,
}

// Safety: the detector's internal reference-counted model is never shared
// outside this struct, so moving the whole detector to another thread is sound.
unsafe impl Send for CascadeFaceDetector {}

impl CascadeFaceDetector {
    pub fn new(model_path: &Path, config: &CascadeConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let path = model_path
            .to_str()
            .ok_or_else(|| format!("Model path is not valid UTF-8: {}", model_path.display()))?;
        let mut detector = rustface::create_detector(path)
            .map_err(|e| format!("Failed to load cascade model {path}: {e}"))?;
        detector.set_min_face_size(config.min_face_size);
        detector.set_score_thresh(config.score_thresh);
        detector.set_pyramid_scale_factor(config.pyramid_scale_factor);
        detector.set_slide_window_step(config.slide_step, config.slide_step);
        Ok(Self { detector })
    }
}

impl FaceDetector for CascadeFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if frame.width() < MIN_WINDOW || frame.height() < MIN_WINDOW {
            return Ok(Vec::new());
        }
        let luma = frame.to_luma();
        let mut image = rustface::ImageData::new(luma.as_raw(), frame.width(), frame.height());
        let regions = self
            .detector
            .detect(&mut image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Region::new(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
                    .with_score(face.score())
            })
            .collect();
        Ok(best_first(regions))
    }
}

fn best_first(mut regions: Vec<Region>) -> Vec<Region> {
    regions.sort_by(|a, b| {
        b.score
            .unwrap_or(f64::MIN)
            .total_cmp(&a.score.unwrap_or(f64::MIN))
    });
    regions
}
