use anyhow::{Context, Result, anyhow};
use ort::{session::Session, value::Tensor};

use super::{
    HandEstimate, HandposeEngine, ProviderConfig,
    common::{self, Roi},
    palm::{PalmDetector, PalmDetectorConfig, crop_from_palm, pick_primary_region},
};
use crate::types::Frame;

pub struct OrtEngine {
    handpose: Session,
    palm_detector: PalmDetector,
}

impl OrtEngine {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let profile = cfg.session_profile();
        let handpose = profile
            .build_session(&cfg.handpose_model_path)
            .context("failed to load hand landmark model")?;

        let palm_detector = PalmDetector::new(
            &cfg.palm_detector_model_path,
            PalmDetectorConfig {
                score_threshold: cfg.min_detection_confidence,
                ..PalmDetectorConfig::default()
            },
            profile,
        )?;

        Ok(Self {
            handpose,
            palm_detector,
        })
    }
}

impl HandposeEngine for OrtEngine {
    fn detect_palm(&mut self, frame: &Frame) -> Result<Option<Roi>> {
        let palm_regions = self.palm_detector.detect(frame)?;
        Ok(pick_primary_region(&palm_regions).map(crop_from_palm))
    }

    fn estimate(&mut self, frame: &Frame, roi: Roi) -> Result<HandEstimate> {
        let (input, transform) = common::prepare_rotated_crop(frame, roi, common::INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = common::decode_landmarks(&flattened)?;

        let scalar_output = |idx: usize| -> f32 {
            if outputs.len() > idx {
                outputs[idx]
                    .try_extract_array::<f32>()
                    .ok()
                    .and_then(|arr| arr.iter().next().copied())
                    .unwrap_or(0.0)
            } else {
                0.0
            }
        };
        let confidence = scalar_output(1);
        let handedness = scalar_output(2);

        Ok(HandEstimate {
            points: common::project_landmarks_with_transform(&landmarks, &transform),
            confidence: confidence.clamp(0.0, 1.0),
            handedness,
        })
    }
}
