//! Utility functions for pixel buffer conversion and numeric casts.

pub mod image_conversion;
pub mod safe_cast;
