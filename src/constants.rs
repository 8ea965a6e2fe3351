//! Constants used throughout the capture core

/// Detection confidence a frame must exceed to count as a face-lock hit
pub const DEFAULT_LOCK_CONFIDENCE: f32 = 0.6;

/// Hit count that must be exceeded before face-lock is acquired
pub const DEFAULT_LOCK_ACQUIRE_HITS: u32 = 8;

/// Minimum seconds between two automatic stills
pub const DEFAULT_MIN_CAPTURE_INTERVAL: f64 = 0.18;

/// Minimum whole-image quality for an automatic still
pub const DEFAULT_MIN_QUALITY: f32 = 0.65;

/// Minimum mouth-region quality for an automatic still
pub const DEFAULT_MIN_MOUTH_QUALITY: f32 = 0.55;

/// Coverage grid dimensions (azimuth columns × elevation rows)
pub const DEFAULT_AZIMUTH_BINS: usize = 8;
pub const DEFAULT_ELEVATION_BINS: usize = 4;

/// Coverage fraction that allows an automatic stop
pub const DEFAULT_AUTO_STOP_COVERAGE: f32 = 0.85;

/// Point buffer caps
pub const DEFAULT_GLOBAL_POINT_CAP: usize = 600_000;
pub const DEFAULT_HEAD_POINT_CAP: usize = 350_000;

/// Margin applied to the head rectangle before gating projected points
pub const HEAD_GATE_EXPANSION: f32 = 1.15;

/// Every n-th head-gated point (by index) is skipped
pub const HEAD_GATE_SKIP_EVERY: usize = 3;

/// Head rectangle growth relative to the face box
pub const HEAD_TOP_EXTRA: f32 = 0.6;
pub const HEAD_BOTTOM_EXTRA: f32 = 0.25;
pub const HEAD_SIDE_EXTRA: f32 = 0.25;

/// Frame throttling strides
pub const DEFAULT_VISION_STRIDE: u64 = 3;
pub const DEFAULT_PREVIEW_STRIDE: u64 = 4;

/// Photogrammetry staging limits
pub const DEFAULT_MAX_RECONSTRUCTION_SAMPLES: usize = 140;
pub const DEFAULT_MIN_RECONSTRUCTION_IMAGES: usize = 20;

/// JPEG quality for persisted stills and staged inputs
pub const STILL_JPEG_QUALITY: u8 = 95;
pub const STAGED_JPEG_QUALITY: u8 = 96;

/// Name of the staging folder nested in each bucket folder
pub const PHOTOGRAMMETRY_INPUT_DIR: &str = "PhotogrammetryInput";

/// File name of the reconstructed model inside the staging folder
pub const RECONSTRUCTION_OUTPUT_FILE: &str = "face_high_detail.usdz";

/// Image extensions accepted as photogrammetry input
pub const STILL_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "heic", "heif"];

/// Numeric precision epsilon
pub const EPSILON: f32 = 1e-6;
