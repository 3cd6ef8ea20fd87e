//! SeetaFace cascade detector via the `rustface` crate.

use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::{
    DEFAULT_MIN_FACE_SIZE, DEFAULT_PYRAMID_SCALE, DEFAULT_SCORE_THRESHOLD, DEFAULT_WINDOW_STEP,
};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// rustface refuses windows and faces smaller than this.
const MIN_SUPPORTED_FACE_SIZE: u32 = 20;

/// Sensitivity knobs, fixed for the lifetime of a detector.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    pub min_face_size: u32,
    pub score_threshold: f64,
    /// Ratio between adjacent pyramid levels, in `(0.01, 0.99)`.
    pub pyramid_scale: f32,
    pub window_step: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            pyramid_scale: DEFAULT_PYRAMID_SCALE,
            window_step: DEFAULT_WINDOW_STEP,
        }
    }
}

impl DetectorSettings {
    /// Rejects values that would make rustface panic.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_face_size < MIN_SUPPORTED_FACE_SIZE {
            return Err(format!(
                "Minimum face size must be at least {MIN_SUPPORTED_FACE_SIZE}, got {}",
                self.min_face_size
            ));
        }
        if self.score_threshold <= 0.0 {
            return Err(format!(
                "Score threshold must be positive, got {}",
                self.score_threshold
            ));
        }
        if !(0.01..=0.99).contains(&self.pyramid_scale) {
            return Err(format!(
                "Pyramid scale must be between 0.01 and 0.99, got {}",
                self.pyramid_scale
            ));
        }
        if self.window_step == 0 {
            return Err("Window step must be positive".to_string());
        }
        Ok(())
    }
}

pub struct RustfaceDetector {
    detector: Box<dyn rustface::Detector>,
}

impl RustfaceDetector {
    /// Loads a SeetaFace model file and configures the cascade.
    pub fn new(
        model_path: &Path,
        settings: &DetectorSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        settings.validate()?;
        let path = model_path
            .to_str()
            .ok_or_else(|| format!("Model path is not valid UTF-8: {}", model_path.display()))?;
        let model = rustface::load_model(path)?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(settings.min_face_size);
        detector.set_score_thresh(settings.score_threshold);
        detector.set_pyramid_scale_factor(settings.pyramid_scale);
        detector.set_slide_window_step(settings.window_step, settings.window_step);

        log::info!(
            "Face detector loaded from {} (min size {}, threshold {})",
            model_path.display(),
            settings.min_face_size,
            settings.score_threshold
        );
        Ok(Self { detector })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&mut self, gray: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if gray.channels() != 1 {
            return Err(format!(
                "Face detector expects a grayscale frame, got {} channels",
                gray.channels()
            )
            .into());
        }
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(Vec::new());
        }

        let image = rustface::ImageData::new(gray.data(), gray.width(), gray.height());
        let faces = self.detector.detect(&image);

        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                let raw = Region::new(
                    bbox.x(),
                    bbox.y(),
                    bbox.width() as i32,
                    bbox.height() as i32,
                );
                raw.clip_to(gray.width(), gray.height())
            })
            .collect())
    }
}
