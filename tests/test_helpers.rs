//! Helper functions and utilities for tests

#![allow(dead_code)]

use dental_face_scan::camera::{CameraFrame, CameraIntrinsics, FrameCamera, PixelBuffer};
use dental_face_scan::detection::{Detection, FixedDetector};
use dental_face_scan::geometry::{Point, Rect, Transform};
use dental_face_scan::quality::ConstantEvaluator;
use dental_face_scan::session::{ScanSession, SessionSettings};
use dental_face_scan::storage::{ImageStore, StillStorage};
use dental_face_scan::types::CaptureBucket;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A 40×30 frame with an identity pose and six points straight ahead
pub fn still_frame(timestamp: f64) -> CameraFrame {
    CameraFrame {
        timestamp,
        image: PixelBuffer::Decoded(RgbImage::from_pixel(40, 30, Rgb([120, 100, 90]))),
        camera: FrameCamera {
            transform: Transform::identity(),
            intrinsics: CameraIntrinsics {
                fx: 40.0,
                fy: 40.0,
                cx: 20.0,
                cy: 15.0,
            },
        },
        raw_feature_points: Some(vec![Point::new(0.0, 0.0, -1.0); 6]),
        depth: None,
    }
}

/// Session with a constant detection (or none) and constant quality
pub fn fixed_session(root: &Path, confidence: Option<f32>, quality: f32) -> ScanSession {
    let detection = confidence.map(|c| Detection::new(Rect::new(0.3, 0.3, 0.4, 0.4), c));
    ScanSession::new(
        SessionSettings::default(),
        Box::new(FixedDetector::new(detection)),
        Box::new(ConstantEvaluator::new(quality)),
        Arc::new(ImageStore::new(root)),
    )
}

/// Write `count` small stills into a bucket and return their paths
pub fn seed_stills(store: &dyn StillStorage, bucket: CaptureBucket, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let shade = u8::try_from(i % 256).unwrap_or(0);
            let img = RgbImage::from_pixel(16, 12, Rgb([shade, 80, 160]));
            store.write(&img, bucket).expect("still written")
        })
        .collect()
}
