//! Camera frames as delivered by the tracking session.

use crate::constants::EPSILON;
use crate::geometry::{invert, transform_point, ImageSize, Point, Transform};
use crate::utils::image_conversion::{
    bgra8_to_image, encoded_to_image, rgb8_to_image, ycbcr_biplanar_to_image,
};
use crate::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics of the capture camera, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in x
    pub fx: f32,
    /// Focal length in y
    pub fy: f32,
    /// Principal point x
    pub cx: f32,
    /// Principal point y
    pub cy: f32,
}

impl CameraIntrinsics {
    /// Typical intrinsics for an image of the given size (focal length = width)
    #[must_use]
    pub fn for_image(size: ImageSize) -> Self {
        Self {
            fx: size.width,
            fy: size.width,
            cx: size.width / 2.0,
            cy: size.height / 2.0,
        }
    }

    /// Whether focal lengths are finite and non-zero
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > f32::EPSILON
            && self.fy.abs() > f32::EPSILON
    }
}

/// Raw camera image in one of the formats the capture session produces
#[derive(Debug, Clone)]
pub enum PixelBuffer {
    /// Packed 8-bit RGB
    Rgb8 {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Row-major pixel bytes
        data: Vec<u8>,
    },
    /// Packed 8-bit BGRA
    Bgra8 {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Row-major pixel bytes
        data: Vec<u8>,
    },
    /// Bi-planar 4:2:0 YCbCr, the native tracking-camera format
    YCbCrBiPlanar {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Full-resolution luma plane
        luma: Vec<u8>,
        /// Half-resolution interleaved CbCr plane
        chroma: Vec<u8>,
    },
    /// Already-decoded image
    Decoded(RgbImage),
    /// Compressed JPEG/PNG bytes
    Encoded(Vec<u8>),
}

impl PixelBuffer {
    /// Decode into an RGB image
    ///
    /// # Errors
    /// * Returns error if the buffer is malformed or cannot be decoded
    pub fn decode(&self) -> Result<RgbImage> {
        match self {
            PixelBuffer::Rgb8 { width, height, data } => rgb8_to_image(*width, *height, data),
            PixelBuffer::Bgra8 { width, height, data } => bgra8_to_image(*width, *height, data),
            PixelBuffer::YCbCrBiPlanar {
                width,
                height,
                luma,
                chroma,
            } => ycbcr_biplanar_to_image(*width, *height, luma, chroma),
            PixelBuffer::Decoded(image) => Ok(image.clone()),
            PixelBuffer::Encoded(bytes) => encoded_to_image(bytes),
        }
    }
}

/// Per-pixel depth in meters, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Depth values
    pub values: Vec<f32>,
}

impl DepthMap {
    /// Little-endian f32 bytes, the on-disk depth sidecar format
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// Camera pose, intrinsics and projection for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCamera {
    /// Camera-to-world transform. The camera looks down its local −Z axis
    /// with +Y up.
    pub transform: Transform,
    /// Pinhole intrinsics matching the captured image
    pub intrinsics: CameraIntrinsics,
}

impl FrameCamera {
    /// Project a world-space point into image pixels.
    ///
    /// Returns `None` for points behind the camera or when the pose or
    /// intrinsics are degenerate.
    #[must_use]
    pub fn project(&self, world: &Point) -> Option<(f32, f32)> {
        let view = invert(&self.transform)?;
        self.project_with_view(&view, world)
    }

    /// Projection with a precomputed world-to-camera transform
    #[must_use]
    pub fn project_with_view(&self, view: &Transform, world: &Point) -> Option<(f32, f32)> {
        if !self.intrinsics.is_valid() {
            return None;
        }
        let local = transform_point(view, world);
        let depth = -local.z;
        if depth <= EPSILON {
            return None;
        }
        let u = self.intrinsics.cx + self.intrinsics.fx * local.x / depth;
        let v = self.intrinsics.cy - self.intrinsics.fy * local.y / depth;
        (u.is_finite() && v.is_finite()).then_some((u, v))
    }
}

/// Camera torch (flash in continuous mode)
pub trait Torch: Send {
    /// Whether the device has a torch at all
    fn is_available(&self) -> bool;

    /// Switch the torch on or off
    ///
    /// # Errors
    /// * Returns error if the device rejects the configuration
    fn set(&mut self, on: bool) -> Result<()>;

    /// State actually reported by the hardware
    fn is_on(&self) -> bool;
}

/// One frame from the tracking session
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Capture time in seconds (monotonic)
    pub timestamp: f64,
    /// Color image
    pub image: PixelBuffer,
    /// Camera pose and intrinsics
    pub camera: FrameCamera,
    /// Sparse world-space feature points tracked this frame
    pub raw_feature_points: Option<Vec<Point>>,
    /// Optional scene depth aligned with the image
    pub depth: Option<DepthMap>,
}
