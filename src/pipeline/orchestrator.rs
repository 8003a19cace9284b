use crate::{
    error::ProcessError,
    gesture::FistClassifier,
    types::{Frame, FrameResult, HandPose, PixelLandmark},
};

use super::provider::{LandmarkProvider, ProviderPool};

pub struct FrameProcessor {
    pool: ProviderPool,
    classifier: FistClassifier,
}

impl FrameProcessor {
    pub fn new(pool: ProviderPool, classifier: FistClassifier) -> Self {
        Self { pool, classifier }
    }

    pub fn pool(&self) -> &ProviderPool {
        &self.pool
    }

    pub fn process_frame(&self, frame: &Frame) -> Result<FrameResult, ProcessError> {
        let pose = {
            let mut provider = self.pool.checkout()?;
            provider.detect(frame).map_err(ProcessError::Provider)?
        };

        let Some(pose) = pose else {
            return Ok(FrameResult::no_hand());
        };

        // Classification stays in normalized space; pixels are only for reporting.
        let is_fist = self.classifier.classify(Some(&pose));
        let landmarks = to_pixel_landmarks(&pose, frame.width, frame.height);
        log::debug!(
            "frame {}x{}: hand detected, fist={is_fist} ({:?} since decode)",
            frame.width,
            frame.height,
            frame.timestamp.elapsed()
        );

        Ok(FrameResult { is_fist, landmarks })
    }
}

/// Scales normalized landmarks to integer pixels, truncating toward zero and
/// keeping every point inside `[0, width) x [0, height)`.
pub fn to_pixel_landmarks(pose: &HandPose, width: u32, height: u32) -> Vec<PixelLandmark> {
    let max_x = width.saturating_sub(1) as i32;
    let max_y = height.saturating_sub(1) as i32;
    pose.landmarks()
        .iter()
        .map(|p| PixelLandmark {
            x: ((p.x * width as f32) as i32).clamp(0, max_x),
            y: ((p.y * height as f32) as i32).clamp(0, max_y),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{Result, anyhow};

    use super::*;
    use crate::{
        gesture::FistThresholds,
        types::{Landmark, NUM_LANDMARKS, landmark},
    };

    struct FixedProvider(Option<HandPose>);

    impl LandmarkProvider for FixedProvider {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<HandPose>> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    impl LandmarkProvider for FailingProvider {
        fn detect(&mut self, _frame: &Frame) -> Result<Option<HandPose>> {
            Err(anyhow!("inference exploded"))
        }
    }

    fn processor(provider: impl LandmarkProvider + 'static) -> FrameProcessor {
        FrameProcessor::new(
            ProviderPool::single(Box::new(provider), Duration::from_millis(50)),
            FistClassifier::new(FistThresholds::default()),
        )
    }

    fn frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![0; (width * height * 4) as usize], width, height)
    }

    fn fist_pose() -> HandPose {
        let mut points = [Landmark::new(0.5, 0.6); NUM_LANDMARKS];
        points[landmark::WRIST] = Landmark::new(0.5, 0.9);
        points[landmark::MIDDLE_PIP] = Landmark::new(0.5, 0.2);
        points[landmark::MIDDLE_TIP] = Landmark::new(0.5, 0.3);
        for (pip, tip) in [
            (landmark::INDEX_PIP, landmark::INDEX_TIP),
            (landmark::RING_PIP, landmark::RING_TIP),
            (landmark::PINKY_PIP, landmark::PINKY_TIP),
        ] {
            points[pip] = Landmark::new(0.4, 0.5);
            points[tip] = Landmark::new(0.4, 0.6);
        }
        HandPose::new(points)
    }

    #[test]
    fn no_hand_yields_empty_result() {
        let result = processor(FixedProvider(None))
            .process_frame(&frame(8, 6))
            .unwrap();
        assert_eq!(result, FrameResult::no_hand());
        assert!(!result.is_fist);
        assert!(result.landmarks.is_empty());
    }

    #[test]
    fn detected_fist_reports_pixel_landmarks() {
        let result = processor(FixedProvider(Some(fist_pose())))
            .process_frame(&frame(640, 480))
            .unwrap();

        assert!(result.is_fist);
        assert_eq!(result.landmarks.len(), NUM_LANDMARKS);
        assert_eq!(result.landmarks[landmark::WRIST], PixelLandmark { x: 320, y: 432 });
        assert_eq!(
            result.landmarks[landmark::MIDDLE_TIP],
            PixelLandmark { x: 320, y: 144 }
        );
    }

    #[test]
    fn provider_failure_is_surfaced() {
        let err = processor(FailingProvider)
            .process_frame(&frame(4, 4))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Provider(_)));
        assert!(err.to_string().contains("inference exploded"));
    }

    #[test]
    fn provider_is_returned_after_each_frame() {
        let processor = processor(FailingProvider);
        for _ in 0..3 {
            assert!(processor.process_frame(&frame(2, 2)).is_err());
        }
        assert_eq!(processor.pool().idle(), 1);
    }

    #[test]
    fn pixel_conversion_truncates_and_stays_in_bounds() {
        let mut points = [Landmark::new(0.999, 0.0); NUM_LANDMARKS];
        points[1] = Landmark::new(1.0, 1.0);
        points[2] = Landmark::new(-0.05, 1.2);
        points[3] = Landmark::new(0.2519, 0.7499);
        let pose = HandPose::new(points);

        let pixels = to_pixel_landmarks(&pose, 100, 40);
        assert_eq!(pixels.len(), NUM_LANDMARKS);
        assert_eq!(pixels[0], PixelLandmark { x: 99, y: 0 });
        assert_eq!(pixels[1], PixelLandmark { x: 99, y: 39 });
        assert_eq!(pixels[2], PixelLandmark { x: 0, y: 39 });
        assert_eq!(pixels[3], PixelLandmark { x: 25, y: 29 });
        for p in &pixels {
            assert!((0..100).contains(&p.x));
            assert!((0..40).contains(&p.y));
        }
    }
}
