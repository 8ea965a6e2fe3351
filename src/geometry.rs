//! Rectangles and rigid-transform helpers shared by the pipeline stages.

use crate::constants::{HEAD_BOTTOM_EXTRA, HEAD_SIDE_EXTRA, HEAD_TOP_EXTRA};
use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// 4×4 rigid camera/world transform (column vectors, ARKit convention)
pub type Transform = Matrix4<f32>;

/// 3D point in world or reference-camera space
pub type Point = Point3<f32>;

/// Image dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl ImageSize {
    /// Create an image size from pixel dimensions
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        #[allow(clippy::cast_precision_loss)] // Image dimensions are far below f32 precision limits
        Self {
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Axis-aligned rectangle with a top-left origin.
///
/// The same type carries pixel rectangles and normalized (0–1) rectangles;
/// [`Rect::normalized`] converts between the two.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rect {
    /// Create a rectangle from origin and size
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge
    #[must_use]
    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge
    #[must_use]
    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Whether the point lies inside (left/top inclusive, right/bottom exclusive)
    #[must_use]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.max_x() && py >= self.y && py < self.max_y()
    }

    /// Scale a pixel rectangle into normalized image coordinates
    #[must_use]
    pub fn normalized(&self, size: ImageSize) -> Self {
        if size.width <= 0.0 || size.height <= 0.0 {
            return Self::default();
        }
        Self {
            x: self.x / size.width,
            y: self.y / size.height,
            width: self.width / size.width,
            height: self.height / size.height,
        }
    }

    /// Scale a normalized rectangle to pixel coordinates
    #[must_use]
    pub fn to_pixels(&self, size: ImageSize) -> Self {
        Self {
            x: self.x * size.width,
            y: self.y * size.height,
            width: self.width * size.width,
            height: self.height * size.height,
        }
    }

    /// Grow a normalized rectangle around its center by `factor`,
    /// then clamp it to the unit square.
    #[must_use]
    pub fn expanded(&self, factor: f32) -> Self {
        let dx = self.width * (factor - 1.0) * 0.5;
        let dy = self.height * (factor - 1.0) * 0.5;

        let x = (self.x - dx).max(0.0);
        let y = (self.y - dy).max(0.0);
        let width = (self.width + 2.0 * dx).min(1.0 - x);
        let height = (self.height + 2.0 * dy).min(1.0 - y);

        Self { x, y, width, height }
    }
}

/// Derive a head rectangle (pixels) from a face box (pixels).
///
/// The face box is grown upward for the skull, slightly downward for the
/// chin and sideways for the ears, staying inside the image.
#[must_use]
pub fn head_rect(face: Rect, image: ImageSize) -> Rect {
    let mut rect = face;

    let top_extra = face.height * HEAD_TOP_EXTRA;
    rect.y = (face.y - top_extra).max(0.0);
    rect.height = face.height + top_extra;

    let bottom_extra = face.height * HEAD_BOTTOM_EXTRA;
    if rect.y + rect.height + bottom_extra <= image.height {
        rect.height += bottom_extra;
    } else {
        rect.height = image.height - rect.y;
    }

    let side_extra = face.width * HEAD_SIDE_EXTRA;
    rect.x = (rect.x - side_extra).max(0.0);
    if rect.x + rect.width + 2.0 * side_extra <= image.width {
        rect.width += 2.0 * side_extra;
    } else {
        rect.width = image.width - rect.x;
    }

    rect
}

/// Apply a homogeneous transform to a point
#[must_use]
pub fn transform_point(transform: &Transform, point: &Point) -> Point {
    transform.transform_point(point)
}

/// Inverse of a camera transform, `None` if it is singular
#[must_use]
pub fn invert(transform: &Transform) -> Option<Transform> {
    transform.try_inverse()
}

/// Bounding rectangle of a set of pixel points
#[must_use]
pub fn bounding_rect(points: &[(f32, f32)]) -> Option<Rect> {
    let (&(first_x, first_y), rest) = points.split_first()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first_x, first_x, first_y, first_y);

    for &(x, y) in rest {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, Vector3};

    #[test]
    fn test_expanded_rect_grows_around_center() {
        let rect = Rect::new(0.4, 0.4, 0.2, 0.2).expanded(1.5);

        assert!((rect.x - 0.35).abs() < 1e-6);
        assert!((rect.y - 0.35).abs() < 1e-6);
        assert!((rect.width - 0.3).abs() < 1e-6);
        assert!((rect.height - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_expanded_rect_is_clamped_to_unit_square() {
        let rect = Rect::new(0.0, 0.9, 1.0, 0.1).expanded(1.15);

        assert!(rect.x >= 0.0 && rect.y >= 0.0);
        assert!(rect.max_x() <= 1.0 + 1e-6);
        assert!(rect.max_y() <= 1.0 + 1e-6);
    }

    #[test]
    fn test_head_rect_stays_inside_image() {
        let image = ImageSize::new(640, 480);
        let face = Rect::new(500.0, 20.0, 120.0, 150.0);
        let head = head_rect(face, image);

        assert!(head.x >= 0.0 && head.y >= 0.0);
        assert!(head.max_x() <= image.width + 1e-3);
        assert!(head.max_y() <= image.height + 1e-3);
        // Grown upward and clamped at the top edge
        assert_eq!(head.y, 0.0);
    }

    #[test]
    fn test_head_rect_adds_margins_in_open_space() {
        let image = ImageSize::new(1000, 1000);
        let face = Rect::new(400.0, 400.0, 100.0, 100.0);
        let head = head_rect(face, image);

        assert!((head.y - 340.0).abs() < 1e-3);
        assert!((head.height - 185.0).abs() < 1e-3);
        assert!((head.x - 375.0).abs() < 1e-3);
        assert!((head.width - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_normalized_round_trip_scale() {
        let size = ImageSize::new(200, 100);
        let px = Rect::new(50.0, 25.0, 100.0, 50.0);
        let norm = px.normalized(size);

        assert_eq!(norm, Rect::new(0.25, 0.25, 0.5, 0.5));
        assert_eq!(norm.to_pixels(size), px);
    }

    #[test]
    fn test_invert_translation() {
        let t: Transform = Translation3::new(1.0, 2.0, 3.0).to_homogeneous();
        let inv = invert(&t).unwrap();
        let p = transform_point(&inv, &Point::new(1.0, 2.0, 3.0));

        assert!((p.coords - Vector3::zeros()).norm() < 1e-6);
    }

    #[test]
    fn test_bounding_rect() {
        assert!(bounding_rect(&[]).is_none());
        let rect = bounding_rect(&[(1.0, 5.0), (3.0, 2.0), (2.0, 4.0)]).unwrap();
        assert_eq!(rect, Rect::new(1.0, 2.0, 2.0, 3.0));
    }
}
