use std::time::Instant;

use thiserror::Error;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::cropping::domain::region_extractor::{ExtractError, RegionExtractor};
use crate::detection::domain::face_detector::FaceDetector;
use crate::estimation::domain::age_gender_predictor::AgeGenderPredictor;
use crate::estimation::domain::inference_batch::{BatchError, InferenceBatch};
use crate::estimation::domain::label::{decode_labels, DecodeError, Label};
use crate::estimation::domain::labeled_face::LabeledFace;
use crate::persistence::domain::label_log::LabelLog;
use crate::shared::frame::Frame;

use super::pipeline_logger::PipelineLogger;

/// A per-frame failure the loop recovers from.
#[derive(Error, Debug)]
pub enum FrameFault {
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error("face extraction failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("could not batch face crops: {0}")]
    Batch(#[from] BatchError),
    #[error("age/gender inference failed: {0}")]
    Inference(String),
    #[error("unusable predictor output: {0}")]
    Decode(#[from] DecodeError),
    #[error("annotation failed: {0}")]
    Annotation(String),
    #[error("could not write labels: {0}")]
    Persistence(String),
}

impl FrameFault {
    /// Short category name used for fault counting.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameFault::Detection(_) => "detection",
            FrameFault::Extraction(_) | FrameFault::Batch(_) => "extraction",
            FrameFault::Inference(_) | FrameFault::Decode(_) => "inference",
            FrameFault::Annotation(_) => "annotation",
            FrameFault::Persistence(_) => "persistence",
        }
    }

    /// Whether the fault discarded the frame's faces.
    pub fn drops_faces(&self) -> bool {
        !matches!(self, FrameFault::Annotation(_) | FrameFault::Persistence(_))
    }
}

/// Result of processing one frame.
#[derive(Debug)]
pub struct FrameEstimate {
    /// The frame, annotated when faces were labeled.
    pub frame: Frame,
    /// One entry per detection, in detector order.
    pub faces: Vec<LabeledFace>,
    pub faults: Vec<FrameFault>,
}

/// Runs detection, cropping, inference, annotation and label logging for a
/// single frame.
///
/// Faces are all-or-nothing per frame: if any stage up to decoding fails,
/// the frame is treated as having no faces, nothing is drawn and nothing
/// is logged. The predictor sees each frame at most once, with every crop
/// of that frame in one batch.
pub struct EstimateFrameUseCase {
    detector: Box<dyn FaceDetector>,
    predictor: Box<dyn AgeGenderPredictor>,
    extractor: RegionExtractor,
    annotator: Box<dyn FrameAnnotator>,
    label_log: Box<dyn LabelLog>,
}

impl EstimateFrameUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        predictor: Box<dyn AgeGenderPredictor>,
        extractor: RegionExtractor,
        annotator: Box<dyn FrameAnnotator>,
        label_log: Box<dyn LabelLog>,
    ) -> Self {
        Self {
            detector,
            predictor,
            extractor,
            annotator,
            label_log,
        }
    }

    pub fn process(&mut self, mut frame: Frame, logger: &mut dyn PipelineLogger) -> FrameEstimate {
        let mut faults = Vec::new();

        let faces = match self.label_faces(&frame, logger) {
            Ok(faces) => faces,
            Err(fault) => {
                faults.push(fault);
                Vec::new()
            }
        };
        logger.metric("faces", faces.len() as f64);

        if !faces.is_empty() {
            let t0 = Instant::now();
            if let Err(e) = self.annotator.annotate(&mut frame, &faces) {
                faults.push(FrameFault::Annotation(e.to_string()));
            }
            logger.timing("annotate", elapsed_ms(t0));

            let t0 = Instant::now();
            let labels: Vec<Label> = faces.iter().map(|f| f.label).collect();
            if let Err(e) = self.label_log.append(&labels) {
                faults.push(FrameFault::Persistence(e.to_string()));
            }
            logger.timing("persist", elapsed_ms(t0));
        }

        for fault in &faults {
            log::warn!("Frame {}: {fault}", frame.index());
            logger.fault(fault.kind());
        }

        FrameEstimate {
            frame,
            faces,
            faults,
        }
    }

    fn label_faces(
        &mut self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<LabeledFace>, FrameFault> {
        let t0 = Instant::now();
        let gray = frame.to_grayscale();
        let detections = self
            .detector
            .detect(&gray)
            .map_err(|e| FrameFault::Detection(e.to_string()))?;
        logger.timing("detect", elapsed_ms(t0));

        if detections.is_empty() {
            return Ok(Vec::new());
        }
        log::debug!("Frame {}: {} faces detected", frame.index(), detections.len());

        let t0 = Instant::now();
        let crops = detections
            .iter()
            .map(|d| self.extractor.extract(frame, Some(d)))
            .collect::<Result<Vec<_>, _>>()?;
        let batch = InferenceBatch::from_crops(&crops)?;
        logger.timing("extract", elapsed_ms(t0));

        let t0 = Instant::now();
        let output = self
            .predictor
            .predict(&batch)
            .map_err(|e| FrameFault::Inference(e.to_string()))?;
        let labels = decode_labels(&output, batch.len())?;
        logger.timing("predict", elapsed_ms(t0));

        Ok(detections
            .into_iter()
            .zip(crops)
            .zip(labels)
            .map(|((detection, crop), label)| LabeledFace {
                detection,
                region: crop.region,
                label,
            })
            .collect())
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
