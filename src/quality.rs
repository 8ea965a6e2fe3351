//! Image quality scoring for capture gating.
//!
//! Sharpness is measured as the variance of the 3×3 Laplacian of the luma
//! channel and squashed into `[0, 1]` with `v / (v + half_point)`.

use crate::geometry::{ImageSize, Rect};
use crate::Result;
use image::{imageops, GrayImage, RgbImage};

/// Laplacian variance that maps to a score of 0.5
pub const DEFAULT_SHARPNESS_HALF_POINT: f64 = 100.0;

/// Score used by [`ConstantEvaluator`] by default
pub const DEFAULT_CONSTANT_SCORE: f32 = 0.8;

/// Whole-frame and mouth-region quality in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct QualityScores {
    /// Whole-frame quality
    pub quality: f32,
    /// Quality of the mouth region
    pub mouth_quality: f32,
}

/// Frame quality scorer
pub trait QualityEvaluator: Send {
    /// Score an image; `mouth_region` is normalized when present
    ///
    /// # Errors
    /// * Returns error if the image cannot be scored
    fn score(&self, image: &RgbImage, mouth_region: Option<Rect>) -> Result<QualityScores>;
}

/// Evaluator that returns fixed scores
#[derive(Debug, Clone, Copy)]
pub struct ConstantEvaluator {
    scores: QualityScores,
}

impl ConstantEvaluator {
    /// Report `value` for both scores
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self {
            scores: QualityScores {
                quality: value,
                mouth_quality: value,
            },
        }
    }
}

impl Default for ConstantEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_CONSTANT_SCORE)
    }
}

impl QualityEvaluator for ConstantEvaluator {
    fn score(&self, _image: &RgbImage, _mouth_region: Option<Rect>) -> Result<QualityScores> {
        Ok(self.scores)
    }
}

/// Laplacian-variance sharpness scorer
#[derive(Debug, Clone, Copy)]
pub struct SharpnessEvaluator {
    half_point: f64,
}

impl Default for SharpnessEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_SHARPNESS_HALF_POINT)
    }
}

impl SharpnessEvaluator {
    /// Create a scorer; `half_point` is the variance that scores 0.5
    #[must_use]
    pub fn new(half_point: f64) -> Self {
        Self {
            half_point: half_point.max(f64::EPSILON),
        }
    }

    /// Map a Laplacian variance to `[0, 1]`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn normalize(&self, variance: f64) -> f32 {
        if !variance.is_finite() || variance <= 0.0 {
            return 0.0;
        }
        (variance / (variance + self.half_point)) as f32
    }
}

impl QualityEvaluator for SharpnessEvaluator {
    fn score(&self, image: &RgbImage, mouth_region: Option<Rect>) -> Result<QualityScores> {
        let gray = imageops::grayscale(image);
        let quality = self.normalize(laplacian_variance(&gray));

        let mouth_quality = match mouth_region.and_then(|roi| crop_region(&gray, roi)) {
            Some(crop) => self.normalize(laplacian_variance(&crop)),
            None => quality,
        };

        Ok(QualityScores { quality, mouth_quality })
    }
}

/// Variance of the 3×3 Laplacian; 0 for images smaller than 3×3
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn laplacian_variance(img: &GrayImage) -> f64 {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut n = 0u64;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = i32::from(img.get_pixel(x, y)[0]);
            let top = i32::from(img.get_pixel(x, y - 1)[0]);
            let bottom = i32::from(img.get_pixel(x, y + 1)[0]);
            let left = i32::from(img.get_pixel(x - 1, y)[0]);
            let right = i32::from(img.get_pixel(x + 1, y)[0]);

            let value = f64::from(top + bottom + left + right - 4 * center);
            sum += value;
            sum_sq += value * value;
            n += 1;
        }
    }

    let n = n as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Crop a normalized region out of an image, `None` if it is empty
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn crop_region(img: &GrayImage, roi: Rect) -> Option<GrayImage> {
    let (width, height) = img.dimensions();
    let px = roi.to_pixels(ImageSize::new(width, height));

    let x0 = px.x.max(0.0).floor() as u32;
    let y0 = px.y.max(0.0).floor() as u32;
    let x1 = (px.max_x().ceil().max(0.0) as u32).min(width);
    let y1 = (px.max_y().ceil().max(0.0) as u32).min(height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image())
}
