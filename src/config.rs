use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{
    gesture::{DEFAULT_FOLD_CLOSENESS_RATIO, DEFAULT_THUMB_TUCK_RATIO, FistThresholds},
    model_download::{DEFAULT_MODELS_DIR, ModelKind, model_path_in},
    pipeline::recognizer::{
        DEFAULT_MIN_DETECTION_CONFIDENCE, DEFAULT_MIN_TRACKING_CONFIDENCE,
        DEFAULT_MODEL_COMPLEXITY, MAX_NUM_HANDS, ProviderConfig,
    },
};

/// Process-wide settings, fixed at startup.
#[derive(Clone, Debug, Parser)]
#[command(name = "gesture-jump")]
#[command(about = "Serve closed-fist detection for the gesture jump game")]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, default_value = "0.0.0.0:5000")]
    pub bind: String,

    /// Directory holding (or receiving) the ONNX models
    #[arg(long, value_name = "DIR", default_value = DEFAULT_MODELS_DIR)]
    pub models_dir: PathBuf,

    /// Directory with index.html and other page assets
    #[arg(long, value_name = "DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Minimum palm/hand presence score for a new detection
    #[arg(long, default_value_t = DEFAULT_MIN_DETECTION_CONFIDENCE, value_parser = unit_interval)]
    pub min_detection_confidence: f32,

    /// Minimum hand presence score to keep following a tracked hand
    #[arg(long, default_value_t = DEFAULT_MIN_TRACKING_CONFIDENCE, value_parser = unit_interval)]
    pub min_tracking_confidence: f32,

    /// Maximum number of hands to report (only one is supported)
    #[arg(long, default_value_t = MAX_NUM_HANDS, value_parser = clap::value_parser!(u8).range(1..=MAX_NUM_HANDS as i64))]
    pub max_num_hands: u8,

    /// Landmark model complexity: 0 is lighter, 1 is the full setting
    #[arg(long, default_value_t = DEFAULT_MODEL_COMPLEXITY, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub model_complexity: u8,

    /// Detect the palm on every frame instead of tracking the previous hand
    #[arg(long)]
    pub static_image_mode: bool,

    /// Fingertip-to-palm distance, relative to hand size, that counts as close
    #[arg(long, default_value_t = DEFAULT_FOLD_CLOSENESS_RATIO, value_parser = positive_ratio)]
    pub fold_closeness_ratio: f32,

    /// Thumb-to-palm distance, relative to hand size, that counts as tucked
    #[arg(long, default_value_t = DEFAULT_THUMB_TUCK_RATIO, value_parser = positive_ratio)]
    pub thumb_tuck_ratio: f32,

    /// Number of independent landmark providers (concurrent inferences)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub providers: u16,

    /// Number of HTTP handler threads
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// How long a request waits for a free provider before failing
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    pub checkout_timeout_ms: u64,
}

impl Config {
    pub fn thresholds(&self) -> FistThresholds {
        FistThresholds {
            fold_closeness_ratio: self.fold_closeness_ratio,
            thumb_tuck_ratio: self.thumb_tuck_ratio,
        }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            handpose_model_path: model_path_in(&self.models_dir, ModelKind::HandposeEstimator),
            palm_detector_model_path: model_path_in(&self.models_dir, ModelKind::PalmDetector),
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
            max_num_hands: self.max_num_hands,
            model_complexity: self.model_complexity,
            static_image_mode: self.static_image_mode,
        }
    }

    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }
}

fn unit_interval(value: &str) -> Result<f32, String> {
    let parsed: f32 = value.parse().map_err(|err| format!("{err}"))?;
    if (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("{parsed} is not within [0, 1]"))
    }
}

fn positive_ratio(value: &str) -> Result<f32, String> {
    let parsed: f32 = value.parse().map_err(|err| format!("{err}"))?;
    if parsed.is_finite() && parsed > 0.0 {
        Ok(parsed)
    } else {
        Err(format!("{parsed} must be a positive number"))
    }
}
