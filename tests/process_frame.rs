use std::{
    collections::VecDeque,
    io::Cursor,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use base64::{Engine, engine::general_purpose::STANDARD};
use gesture_jump::{
    FistClassifier, FistThresholds, Frame, FrameProcessor, GestureService, HandPose, Landmark,
    LandmarkProvider, ProviderPool, types::landmark,
};
use serde_json::{Value, json};
use tiny_http::Method;

struct ScriptedProvider {
    poses: VecDeque<Option<HandPose>>,
    seen: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl LandmarkProvider for ScriptedProvider {
    fn detect(&mut self, frame: &Frame) -> Result<Option<HandPose>> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((frame.width, frame.height));
        }
        Ok(self.poses.pop_front().flatten())
    }
}

fn scripted_service(
    poses: Vec<Option<HandPose>>,
) -> (GestureService, Arc<Mutex<Vec<(u32, u32)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let provider = ScriptedProvider {
        poses: poses.into(),
        seen: seen.clone(),
    };
    let processor = FrameProcessor::new(
        ProviderPool::single(Box::new(provider), Duration::from_millis(100)),
        FistClassifier::new(FistThresholds::default()),
    );
    (GestureService::new(processor, "static"), seen)
}

fn jpeg_data_url(width: u32, height: u32) -> String {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 180, 160]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

/// Wrist at (0.5, 0.9) and middle tip at (0.5, 0.3): hand size 0.6.
fn upright_points() -> [Landmark; 21] {
    let mut points = [Landmark::new(0.5, 0.6); 21];
    points[landmark::WRIST] = Landmark::new(0.5, 0.9);
    points[landmark::MIDDLE_TIP] = Landmark::new(0.5, 0.3);
    points
}

/// All four fingers curled with tips below their pips.
fn curled_fist() -> HandPose {
    let mut points = upright_points();
    for (pip, tip) in [
        (landmark::INDEX_PIP, landmark::INDEX_TIP),
        (landmark::RING_PIP, landmark::RING_TIP),
        (landmark::PINKY_PIP, landmark::PINKY_TIP),
    ] {
        points[pip] = Landmark::new(0.45, 0.5);
        points[tip] = Landmark::new(0.45, 0.6);
    }
    // The middle tip fixes the hand size, so its pip sits above it.
    points[landmark::MIDDLE_PIP] = Landmark::new(0.5, 0.2);
    HandPose::new(points)
}

fn open_palm() -> HandPose {
    let mut points = upright_points();
    for (i, (pip, tip)) in landmark::FINGERS.into_iter().enumerate() {
        let x = 0.35 + 0.1 * i as f32;
        points[pip] = Landmark::new(x, 0.45);
        points[tip] = Landmark::new(x, 0.3);
    }
    points[landmark::THUMB_TIP] = Landmark::new(0.2, 0.55);
    HandPose::new(points)
}

fn post(service: &GestureService, image: &str) -> (u16, Value) {
    let body = json!({ "image": image }).to_string();
    let response = service.handle(&Method::Post, "/process_frame", body.as_bytes());
    let value = response.json_body().cloned().expect("json reply");
    (response.status, value)
}

#[test]
fn absent_hand_always_reports_no_jump() {
    let (service, _) = scripted_service(vec![None, Some(curled_fist()), None]);
    let image = jpeg_data_url(64, 48);

    let (status, body) = post(&service, &image);
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "jump": false, "landmarks": [] }));

    let (_, body) = post(&service, &image);
    assert_eq!(body["jump"], json!(true));

    // A fist on the previous frame does not leak into the next empty one.
    let (_, body) = post(&service, &image);
    assert_eq!(body, json!({ "jump": false, "landmarks": [] }));
}

#[test]
fn fist_and_open_hand_sequence() {
    let (service, seen) =
        scripted_service(vec![Some(open_palm()), Some(curled_fist()), Some(open_palm())]);
    let image = jpeg_data_url(320, 240);

    let jumps: Vec<Value> = (0..3).map(|_| post(&service, &image).1["jump"].clone()).collect();
    assert_eq!(jumps, vec![json!(false), json!(true), json!(false)]);
    assert_eq!(*seen.lock().unwrap(), vec![(320, 240); 3]);
}

#[test]
fn landmarks_are_21_pixels_inside_the_frame() {
    let mut points = upright_points();
    points[landmark::THUMB_TIP] = Landmark::new(1.0, 1.0);
    points[landmark::PINKY_TIP] = Landmark::new(-0.1, 0.0);
    let (service, _) = scripted_service(vec![Some(HandPose::new(points))]);

    let (status, body) = post(&service, &jpeg_data_url(160, 120));
    assert_eq!(status, 200);

    let landmarks = body["landmarks"].as_array().expect("landmark list");
    assert_eq!(landmarks.len(), 21);
    for point in landmarks {
        let x = point["x"].as_i64().unwrap();
        let y = point["y"].as_i64().unwrap();
        assert!((0..160).contains(&x), "x out of range: {point}");
        assert!((0..120).contains(&y), "y out of range: {point}");
    }
    assert_eq!(landmarks[landmark::MIDDLE_TIP], json!({ "x": 80, "y": 36 }));
    assert_eq!(landmarks[landmark::THUMB_TIP], json!({ "x": 159, "y": 119 }));
    assert_eq!(landmarks[landmark::PINKY_TIP], json!({ "x": 0, "y": 0 }));
}

#[test]
fn bad_requests_never_reach_the_provider() {
    let (service, seen) = scripted_service(vec![Some(curled_fist())]);

    let (status, body) = post(&service, "");
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "No image data" }));

    let (status, body) = post(&service, "data:image/jpeg;base64,!!not-base64!!");
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "Invalid image data" }));

    let (status, body) = post(&service, &jpeg_data_url(5000, 8));
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "Invalid image data" }));

    assert!(seen.lock().unwrap().is_empty());
}
