//! Face detections and the detector trait.

use crate::geometry::{bounding_rect, ImageSize, Rect};
use crate::Result;
use image::RgbImage;

/// Face detection result in normalized (0–1, top-left origin) image coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box of the face
    pub face_box: Rect,
    /// Region around the lips, when landmarks were found
    pub mouth_region: Option<Rect>,
    /// Detector confidence in `[0, 1]`
    pub confidence: f32,
    /// Landmark keypoints (eyes, nose, lips, contour)
    pub keypoints: Vec<(f32, f32)>,
}

impl Detection {
    /// Detection with a face box only
    #[must_use]
    pub fn new(face_box: Rect, confidence: f32) -> Self {
        Self {
            face_box,
            mouth_region: None,
            confidence: confidence.clamp(0.0, 1.0),
            keypoints: Vec::new(),
        }
    }

    /// Build a detection from pixel-space landmarks.
    ///
    /// The mouth region is the bounding box of the outer lips, else of the
    /// inner lips, else the face box itself.
    #[must_use]
    pub fn from_landmarks(face_px: Rect, landmarks: &FaceLandmarks, confidence: f32, image: ImageSize) -> Self {
        let mouth_px = bounding_rect(&landmarks.outer_lips)
            .or_else(|| bounding_rect(&landmarks.inner_lips))
            .unwrap_or(face_px);

        let keypoints = landmarks
            .all_points()
            .filter(|_| image.width > 0.0 && image.height > 0.0)
            .map(|(x, y)| (x / image.width, y / image.height))
            .collect();

        Self {
            face_box: face_px.normalized(image),
            mouth_region: Some(mouth_px.normalized(image)),
            confidence: confidence.clamp(0.0, 1.0),
            keypoints,
        }
    }

    /// Face box in pixels for an image of the given size
    #[must_use]
    pub fn face_box_pixels(&self, image: ImageSize) -> Rect {
        self.face_box.to_pixels(image)
    }
}

/// Pixel-space landmark regions reported by a landmark detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceLandmarks {
    /// Eye outlines
    pub eyes: Vec<(f32, f32)>,
    /// Nose and nose crest
    pub nose: Vec<(f32, f32)>,
    /// Outer lip contour
    pub outer_lips: Vec<(f32, f32)>,
    /// Inner lip contour
    pub inner_lips: Vec<(f32, f32)>,
    /// Jaw/face contour
    pub contour: Vec<(f32, f32)>,
}

impl FaceLandmarks {
    /// Every landmark point, region by region
    pub fn all_points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.eyes
            .iter()
            .chain(&self.nose)
            .chain(&self.outer_lips)
            .chain(&self.inner_lips)
            .chain(&self.contour)
            .copied()
    }
}

/// Convert a bottom-left-origin normalized rectangle (as reported by some
/// platform vision APIs) to the top-left convention used throughout the crate
#[must_use]
pub fn flip_vertical(rect: Rect) -> Rect {
    Rect::new(rect.x, 1.0 - rect.y - rect.height, rect.width, rect.height)
}

/// Face and landmark detector
pub trait FaceDetector: Send {
    /// Detect the most prominent face, `Ok(None)` when there is none
    ///
    /// # Errors
    /// * Returns error if the detector fails on this image
    fn detect(&mut self, image: &RgbImage) -> Result<Option<Detection>>;
}

/// Detector that reports the same result for every frame.
///
/// Useful for replaying recorded detections and for driving the pipeline
/// without a model.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    detection: Option<Detection>,
}

impl FixedDetector {
    /// Always report `detection`
    #[must_use]
    pub fn new(detection: Option<Detection>) -> Self {
        Self { detection }
    }

    /// Replace the reported detection
    pub fn set(&mut self, detection: Option<Detection>) {
        self.detection = detection;
    }
}

impl FaceDetector for FixedDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Option<Detection>> {
        Ok(self.detection.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouth_region_prefers_outer_lips() {
        let landmarks = FaceLandmarks {
            outer_lips: vec![(40.0, 60.0), (60.0, 70.0)],
            inner_lips: vec![(45.0, 62.0), (55.0, 66.0)],
            ..FaceLandmarks::default()
        };
        let det = Detection::from_landmarks(
            Rect::new(20.0, 20.0, 60.0, 60.0),
            &landmarks,
            0.9,
            ImageSize::new(100, 100),
        );
        let mouth = det.mouth_region.unwrap();
        assert!((mouth.x - 0.4).abs() < 1e-6);
        assert!((mouth.width - 0.2).abs() < 1e-6);
        assert_eq!(det.keypoints.len(), 4);
    }

    #[test]
    fn test_mouth_region_falls_back_to_face_box() {
        let det = Detection::from_landmarks(
            Rect::new(20.0, 20.0, 60.0, 60.0),
            &FaceLandmarks::default(),
            1.5,
            ImageSize::new(100, 100),
        );
        assert_eq!(det.mouth_region, Some(Rect::new(0.2, 0.2, 0.6, 0.6)));
        assert_eq!(det.confidence, 1.0);
    }

    #[test]
    fn test_flip_vertical() {
        let flipped = flip_vertical(Rect::new(0.1, 0.2, 0.3, 0.4));
        assert!((flipped.y - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_detector() {
        let mut detector = FixedDetector::new(Some(Detection::new(Rect::new(0.0, 0.0, 1.0, 1.0), 0.8)));
        let image = RgbImage::new(4, 4);
        assert!(detector.detect(&image).unwrap().is_some());
        detector.set(None);
        assert!(detector.detect(&image).unwrap().is_none());
    }
}
