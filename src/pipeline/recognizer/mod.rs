pub mod common;
pub mod ort;
pub mod palm;

use std::path::{Path, PathBuf};

use ::ort::session::{Session, builder::GraphOptimizationLevel};
use anyhow::{Context, Result, bail};

use common::{Roi, normalize_points, roi_from_landmarks};

use super::provider::LandmarkProvider;
use crate::{
    model_download::{ModelKind, default_model_path},
    types::{Frame, HandPose},
};

pub use self::ort::OrtEngine;

pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.6;
pub const DEFAULT_MIN_TRACKING_CONFIDENCE: f32 = 0.6;
pub const DEFAULT_MODEL_COMPLEXITY: u8 = 1;
/// Only the strongest palm is followed.
pub const MAX_NUM_HANDS: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionProfile {
    pub complexity: u8,
}

impl SessionProfile {
    pub fn intra_threads(&self) -> usize {
        if self.complexity == 0 { 1 } else { 2 }
    }

    pub fn build_session(&self, model_path: &Path) -> Result<Session> {
        let level = if self.complexity == 0 {
            GraphOptimizationLevel::Level1
        } else {
            GraphOptimizationLevel::Level3
        };
        let session = Session::builder()?
            .with_optimization_level(level)?
            .with_intra_threads(self.intra_threads())?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;
        Ok(session)
    }
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub handpose_model_path: PathBuf,
    pub palm_detector_model_path: PathBuf,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub max_num_hands: u8,
    pub model_complexity: u8,
    /// Run palm detection on every frame instead of following the last hand.
    pub static_image_mode: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            handpose_model_path: default_model_path(ModelKind::HandposeEstimator),
            palm_detector_model_path: default_model_path(ModelKind::PalmDetector),
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            min_tracking_confidence: DEFAULT_MIN_TRACKING_CONFIDENCE,
            max_num_hands: MAX_NUM_HANDS,
            model_complexity: DEFAULT_MODEL_COMPLEXITY,
            static_image_mode: false,
        }
    }
}

impl ProviderConfig {
    pub fn session_profile(&self) -> SessionProfile {
        SessionProfile {
            complexity: self.model_complexity,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HandEstimate {
    pub points: Vec<(f32, f32)>,
    pub confidence: f32,
    pub handedness: f32,
}

pub trait HandposeEngine: Send {
    fn detect_palm(&mut self, frame: &Frame) -> Result<Option<Roi>>;
    fn estimate(&mut self, frame: &Frame, roi: Roi) -> Result<HandEstimate>;
}

/// Runs palm detection only when no hand is being followed; otherwise the
/// previous frame's landmarks define the crop.
pub struct TrackingProvider<E> {
    engine: E,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    static_image_mode: bool,
    tracked: Option<Roi>,
}

impl<E: HandposeEngine> TrackingProvider<E> {
    pub fn new(engine: E, cfg: &ProviderConfig) -> Self {
        Self {
            engine,
            min_detection_confidence: cfg.min_detection_confidence,
            min_tracking_confidence: cfg.min_tracking_confidence,
            static_image_mode: cfg.static_image_mode,
            tracked: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracked.is_some()
    }

    fn accept(&mut self, frame: &Frame, estimate: HandEstimate) -> Option<HandPose> {
        log::trace!(
            "hand accepted: presence {:.2}, handedness {:.2}",
            estimate.confidence,
            estimate.handedness
        );
        if !self.static_image_mode {
            self.tracked = roi_from_landmarks(&estimate.points);
        }
        HandPose::from_slice(&normalize_points(
            &estimate.points,
            frame.width,
            frame.height,
        ))
    }
}

impl<E: HandposeEngine> LandmarkProvider for TrackingProvider<E> {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandPose>> {
        if let Some(roi) = self.tracked.take() {
            let estimate = self.engine.estimate(frame, roi)?;
            if estimate.confidence >= self.min_tracking_confidence {
                return Ok(self.accept(frame, estimate));
            }
            log::debug!(
                "hand track lost (confidence {:.2}), falling back to palm detection",
                estimate.confidence
            );
        }

        let Some(roi) = self.engine.detect_palm(frame)? else {
            return Ok(None);
        };
        let estimate = self.engine.estimate(frame, roi)?;
        if estimate.confidence < self.min_detection_confidence {
            return Ok(None);
        }
        Ok(self.accept(frame, estimate))
    }
}

pub fn create_ort_provider(cfg: &ProviderConfig) -> Result<Box<dyn LandmarkProvider>> {
    if cfg.max_num_hands != MAX_NUM_HANDS {
        bail!(
            "max_num_hands {} is not supported, only {MAX_NUM_HANDS} hand can be tracked",
            cfg.max_num_hands
        );
    }
    let engine = OrtEngine::new(cfg)?;
    log::info!(
        "handpose ORT backend ready using {} and palm detector {} (complexity {})",
        cfg.handpose_model_path.display(),
        cfg.palm_detector_model_path.display(),
        cfg.model_complexity
    );
    Ok(Box::new(TrackingProvider::new(engine, cfg)))
}
