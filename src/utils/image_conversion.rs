//! Pixel buffer conversions from camera capture formats to RGB images.

use crate::{Error, Result};
use image::RgbImage;

fn expected_len(width: u32, height: u32, channels: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::FrameDecode(format!(
            "Invalid buffer dimensions: {width}x{height}"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| Error::FrameDecode(format!("Buffer {width}x{height} is too large")))
}

/// Wrap a packed RGB8 buffer as an image
///
/// # Errors
/// * Returns error if the buffer length does not match the dimensions
pub fn rgb8_to_image(width: u32, height: u32, data: &[u8]) -> Result<RgbImage> {
    let len = expected_len(width, height, 3)?;
    if data.len() != len {
        return Err(Error::FrameDecode(format!(
            "RGB buffer has {} bytes, expected {len}",
            data.len()
        )));
    }
    RgbImage::from_raw(width, height, data.to_vec())
        .ok_or_else(|| Error::FrameDecode("RGB buffer rejected".to_string()))
}

/// Convert a packed BGRA8 buffer to RGB, dropping alpha
///
/// # Errors
/// * Returns error if the buffer length does not match the dimensions
pub fn bgra8_to_image(width: u32, height: u32, data: &[u8]) -> Result<RgbImage> {
    let len = expected_len(width, height, 4)?;
    if data.len() != len {
        return Err(Error::FrameDecode(format!(
            "BGRA buffer has {} bytes, expected {len}",
            data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(len / 4 * 3);
    for px in data.chunks_exact(4) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| Error::FrameDecode("BGRA buffer rejected".to_string()))
}

/// Convert a bi-planar 4:2:0 YCbCr buffer (full-range BT.601, interleaved
/// CbCr plane at half resolution) to RGB.
///
/// # Errors
/// * Returns error if either plane length does not match the dimensions
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Values are clamped to 0..=255
pub fn ycbcr_biplanar_to_image(width: u32, height: u32, luma: &[u8], chroma: &[u8]) -> Result<RgbImage> {
    let luma_len = expected_len(width, height, 1)?;
    let chroma_w = (width as usize).div_ceil(2);
    let chroma_h = (height as usize).div_ceil(2);
    let chroma_len = chroma_w * chroma_h * 2;

    if luma.len() != luma_len {
        return Err(Error::FrameDecode(format!(
            "Luma plane has {} bytes, expected {luma_len}",
            luma.len()
        )));
    }
    if chroma.len() != chroma_len {
        return Err(Error::FrameDecode(format!(
            "Chroma plane has {} bytes, expected {chroma_len}",
            chroma.len()
        )));
    }

    let w = width as usize;
    let mut rgb = Vec::with_capacity(luma_len * 3);
    for (i, &y) in luma.iter().enumerate() {
        let (row, col) = (i / w, i % w);
        let c = ((row / 2) * chroma_w + col / 2) * 2;
        let y = f32::from(y);
        let cb = f32::from(chroma[c]) - 128.0;
        let cr = f32::from(chroma[c + 1]) - 128.0;

        let r = y + 1.402 * cr;
        let g = y - 0.344_136 * cb - 0.714_136 * cr;
        let b = y + 1.772 * cb;
        rgb.extend_from_slice(&[
            r.round().clamp(0.0, 255.0) as u8,
            g.round().clamp(0.0, 255.0) as u8,
            b.round().clamp(0.0, 255.0) as u8,
        ]);
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| Error::FrameDecode("YCbCr buffer rejected".to_string()))
}

/// Decode a compressed image (JPEG/PNG) to RGB
///
/// # Errors
/// * Returns error if the bytes are not a supported image
pub fn encoded_to_image(bytes: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgb_swaps_channels() {
        let data = [10, 20, 30, 255, 1, 2, 3, 0];
        let img = bgra8_to_image(2, 1, &data).unwrap();

        assert_eq!(img.get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(img.get_pixel(1, 0).0, [3, 2, 1]);
    }

    #[test]
    fn test_rgb_buffer_length_mismatch() {
        assert!(rgb8_to_image(2, 2, &[0; 11]).is_err());
        assert!(rgb8_to_image(0, 2, &[]).is_err());
    }

    #[test]
    fn test_ycbcr_neutral_chroma_is_gray() {
        let luma = [0, 128, 255, 64];
        let chroma = [128, 128];
        let img = ycbcr_biplanar_to_image(2, 2, &luma, &chroma).unwrap();

        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [128, 128, 128]);
        assert_eq!(img.get_pixel(0, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_ycbcr_odd_dimensions() {
        let luma = [100u8; 9];
        let chroma = [128u8; 8];
        assert!(ycbcr_biplanar_to_image(3, 3, &luma, &chroma).is_ok());
        assert!(ycbcr_biplanar_to_image(3, 3, &luma, &chroma[..6]).is_err());
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(encoded_to_image(b"not an image").is_err());
    }
}
