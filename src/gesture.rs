use crate::types::{HandPose, landmark};

pub const DEFAULT_FOLD_CLOSENESS_RATIO: f32 = 0.4;
pub const DEFAULT_THUMB_TUCK_RATIO: f32 = 0.35;

const MIN_FOLDED_WITH_SUPPORT: usize = 2;
const MIN_CLOSE_FINGERTIPS: usize = 2;
const MIN_FOLDED_ALONE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FistThresholds {
    pub fold_closeness_ratio: f32,
    pub thumb_tuck_ratio: f32,
}

impl Default for FistThresholds {
    fn default() -> Self {
        Self {
            fold_closeness_ratio: DEFAULT_FOLD_CLOSENESS_RATIO,
            thumb_tuck_ratio: DEFAULT_THUMB_TUCK_RATIO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometricFeatures {
    pub hand_size: f32,
    pub fingers_folded: usize,
    pub fingertips_close: usize,
    pub thumb_tucked: bool,
}

impl GeometricFeatures {
    pub fn extract(pose: &HandPose, thresholds: &FistThresholds) -> Option<Self> {
        let wrist = pose.get(landmark::WRIST);
        let palm = pose.get(landmark::PALM_CENTER);

        let hand_size = wrist.distance(&pose.get(landmark::MIDDLE_TIP));
        if !hand_size.is_finite() || hand_size <= 0.0 {
            return None;
        }

        let close_limit = hand_size * thresholds.fold_closeness_ratio;
        let mut fingers_folded = 0;
        let mut fingertips_close = 0;
        for (pip, tip) in landmark::FINGERS {
            let pip = pose.get(pip);
            let tip = pose.get(tip);
            // y grows downward, so a curled finger puts its tip below the pip.
            if tip.y > pip.y {
                fingers_folded += 1;
            }
            if tip.distance(&palm) < close_limit {
                fingertips_close += 1;
            }
        }

        let thumb_distance = pose.get(landmark::THUMB_TIP).distance(&palm);
        let thumb_tucked = thumb_distance < hand_size * thresholds.thumb_tuck_ratio;

        Some(Self {
            hand_size,
            fingers_folded,
            fingertips_close,
            thumb_tucked,
        })
    }

    pub fn is_fist(&self) -> bool {
        let folded_and_close = self.fingers_folded >= MIN_FOLDED_WITH_SUPPORT
            && self.fingertips_close >= MIN_CLOSE_FINGERTIPS;
        let mostly_folded = self.fingers_folded >= MIN_FOLDED_ALONE;
        let folded_with_thumb =
            self.thumb_tucked && self.fingers_folded >= MIN_FOLDED_WITH_SUPPORT;

        folded_and_close || mostly_folded || folded_with_thumb
    }
}

pub fn classify(pose: Option<&HandPose>, thresholds: &FistThresholds) -> bool {
    let Some(pose) = pose else {
        return false;
    };
    match GeometricFeatures::extract(pose, thresholds) {
        Some(features) => {
            log::trace!("fist features: {features:?}");
            features.is_fist()
        }
        None => false,
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FistClassifier {
    thresholds: FistThresholds,
}

impl FistClassifier {
    pub fn new(thresholds: FistThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &FistThresholds {
        &self.thresholds
    }

    pub fn classify(&self, pose: Option<&HandPose>) -> bool {
        classify(pose, &self.thresholds)
    }
}
