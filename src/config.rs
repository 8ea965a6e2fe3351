//! Configuration management for the scan capture core

use crate::capture_decision::CapturePolicy;
use crate::constants::{
    DEFAULT_AUTO_STOP_COVERAGE, DEFAULT_AZIMUTH_BINS, DEFAULT_ELEVATION_BINS, DEFAULT_GLOBAL_POINT_CAP,
    DEFAULT_HEAD_POINT_CAP, DEFAULT_LOCK_ACQUIRE_HITS, DEFAULT_LOCK_CONFIDENCE, DEFAULT_MAX_RECONSTRUCTION_SAMPLES,
    DEFAULT_MIN_CAPTURE_INTERVAL, DEFAULT_MIN_MOUTH_QUALITY, DEFAULT_MIN_QUALITY, DEFAULT_MIN_RECONSTRUCTION_IMAGES,
    DEFAULT_PREVIEW_STRIDE, DEFAULT_VISION_STRIDE, HEAD_GATE_EXPANSION, HEAD_GATE_SKIP_EVERY, STILL_JPEG_QUALITY,
};
use crate::point_accumulator::AccumulatorSettings;
use crate::reconstruction::ReconstructionSettings;
use crate::session::SessionSettings;
use crate::storage::ImageStore;
use crate::types::{CaptureMode, PlanningMode, PreviewMode};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Face-lock hysteresis
    pub face_lock: FaceLockConfig,

    /// Still capture policy and modes
    pub capture: CaptureConfig,

    /// Coverage grid and auto-stop
    pub coverage: CoverageConfig,

    /// Point accumulation
    pub points: PointsConfig,

    /// Per-frame throttling
    pub throttle: ThrottleConfig,

    /// Photogrammetry staging
    pub reconstruction: ReconstructionConfig,

    /// Still storage
    pub storage: StorageConfig,
}

/// Face-lock parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceLockConfig {
    /// Detection confidence a frame must exceed to count as a hit (0.0-1.0)
    pub confidence_threshold: f32,

    /// Hit count that must be exceeded to acquire lock
    pub acquire_hits: u32,
}

/// Capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Minimum seconds between automatic stills
    pub min_interval: f64,

    /// Minimum whole-frame quality (0.0-1.0)
    pub min_quality: f32,

    /// Minimum mouth-region quality (0.0-1.0)
    pub min_mouth_quality: f32,

    /// Manual shutter needs face-lock
    pub manual_requires_face_lock: bool,

    /// Initial capture mode
    pub mode: CaptureMode,

    /// Initial planning mode
    pub planning_mode: PlanningMode,

    /// Initial preview mode
    pub preview_mode: PreviewMode,
}

/// Coverage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Azimuth bins
    pub azimuth_bins: usize,

    /// Elevation bins
    pub elevation_bins: usize,

    /// Coverage fraction that allows an auto-stop (0.0-1.0)
    pub auto_stop_fraction: f32,
}

/// Point accumulation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    /// Global buffer cap per bucket
    pub global_cap: usize,

    /// Head-gated buffer cap per bucket
    pub head_cap: usize,

    /// Head rectangle expansion before gating
    pub head_expansion: f32,

    /// Skip every n-th head-gated point (0 disables)
    pub head_skip_every: usize,
}

/// Throttling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Run the detector every n-th frame
    pub vision_stride: u64,

    /// Rebuild the preview every n-th frame
    pub preview_stride: u64,
}

/// Reconstruction staging parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Maximum stills staged per run
    pub max_samples: usize,

    /// Minimum stills required to run
    pub min_images: usize,
}

/// Storage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root folder for capture buckets
    pub root: PathBuf,

    /// JPEG quality of persisted stills (1-100)
    pub jpeg_quality: u8,

    /// Write depth sidecars
    pub write_depth: bool,

    /// Write metadata sidecars
    pub write_metadata: bool,

    /// Encode and write stills on a background task
    pub background_writes: bool,
}

impl Default for FaceLockConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_LOCK_CONFIDENCE,
            acquire_hits: DEFAULT_LOCK_ACQUIRE_HITS,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_CAPTURE_INTERVAL,
            min_quality: DEFAULT_MIN_QUALITY,
            min_mouth_quality: DEFAULT_MIN_MOUTH_QUALITY,
            manual_requires_face_lock: true,
            mode: CaptureMode::Auto,
            planning_mode: PlanningMode::Esthetic,
            preview_mode: PreviewMode::PointCloud,
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            azimuth_bins: DEFAULT_AZIMUTH_BINS,
            elevation_bins: DEFAULT_ELEVATION_BINS,
            auto_stop_fraction: DEFAULT_AUTO_STOP_COVERAGE,
        }
    }
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            global_cap: DEFAULT_GLOBAL_POINT_CAP,
            head_cap: DEFAULT_HEAD_POINT_CAP,
            head_expansion: HEAD_GATE_EXPANSION,
            head_skip_every: HEAD_GATE_SKIP_EVERY,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            vision_stride: DEFAULT_VISION_STRIDE,
            preview_stride: DEFAULT_PREVIEW_STRIDE,
        }
    }
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_RECONSTRUCTION_SAMPLES,
            min_images: DEFAULT_MIN_RECONSTRUCTION_IMAGES,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("Captures"),
            jpeg_quality: STILL_JPEG_QUALITY,
            write_depth: true,
            write_metadata: true,
            background_writes: false,
        }
    }
}

fn check_unit(value: f32, name: &str) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::ConfigError(format!("{name} must be between 0.0 and 1.0")))
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// * Returns error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    /// * Returns error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    /// * Returns `ConfigError` naming the first invalid value
    pub fn validate(&self) -> Result<()> {
        // Thresholds
        check_unit(self.face_lock.confidence_threshold, "Face-lock confidence threshold")?;
        check_unit(self.capture.min_quality, "Minimum quality")?;
        check_unit(self.capture.min_mouth_quality, "Minimum mouth quality")?;
        check_unit(self.coverage.auto_stop_fraction, "Auto-stop coverage fraction")?;
        if !self.capture.min_interval.is_finite() || self.capture.min_interval < 0.0 {
            return Err(Error::ConfigError(
                "Minimum capture interval must be a non-negative number of seconds".to_string(),
            ));
        }

        // Grid and buffers
        if self.coverage.azimuth_bins == 0 || self.coverage.elevation_bins == 0 {
            return Err(Error::ConfigError("Coverage grid must have at least one bin per axis".to_string()));
        }
        if self.points.global_cap == 0 || self.points.head_cap == 0 {
            return Err(Error::ConfigError("Point buffer caps must be greater than 0".to_string()));
        }
        if !self.points.head_expansion.is_finite() || self.points.head_expansion < 1.0 {
            return Err(Error::ConfigError("Head expansion must be at least 1.0".to_string()));
        }

        // Throttling
        if self.throttle.vision_stride == 0 || self.throttle.preview_stride == 0 {
            return Err(Error::ConfigError("Throttle strides must be greater than 0".to_string()));
        }

        // Reconstruction
        if self.reconstruction.min_images == 0 {
            return Err(Error::ConfigError("Minimum reconstruction images must be greater than 0".to_string()));
        }
        if self.reconstruction.max_samples < self.reconstruction.min_images {
            return Err(Error::ConfigError(format!(
                "Reconstruction max samples ({}) must be at least min images ({})",
                self.reconstruction.max_samples, self.reconstruction.min_images
            )));
        }

        // Storage
        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(Error::ConfigError("JPEG quality must be between 1 and 100".to_string()));
        }

        Ok(())
    }

    /// Session tunables described by this configuration
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            vision_stride: self.throttle.vision_stride,
            preview_stride: self.throttle.preview_stride,
            lock_confidence: self.face_lock.confidence_threshold,
            lock_acquire_hits: self.face_lock.acquire_hits,
            capture: CapturePolicy {
                min_interval: self.capture.min_interval,
                min_quality: self.capture.min_quality,
                min_mouth_quality: self.capture.min_mouth_quality,
                manual_requires_face_lock: self.capture.manual_requires_face_lock,
            },
            azimuth_bins: self.coverage.azimuth_bins,
            elevation_bins: self.coverage.elevation_bins,
            auto_stop_coverage: self.coverage.auto_stop_fraction,
            points: AccumulatorSettings {
                global_cap: self.points.global_cap,
                head_cap: self.points.head_cap,
                head_expansion: self.points.head_expansion,
                head_skip_every: self.points.head_skip_every,
            },
            write_depth: self.storage.write_depth,
            write_metadata: self.storage.write_metadata,
        }
    }

    /// Reconstruction staging limits
    #[must_use]
    pub fn reconstruction_settings(&self) -> ReconstructionSettings {
        ReconstructionSettings {
            max_samples: self.reconstruction.max_samples,
            min_images: self.reconstruction.min_images,
        }
    }

    /// Filesystem store at the configured root
    #[must_use]
    pub fn image_store(&self) -> ImageStore {
        ImageStore::with_quality(&self.storage.root, self.storage.jpeg_quality)
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Dental Face Scan Configuration

# Face-lock hysteresis
face_lock:
  confidence_threshold: 0.6
  acquire_hits: 8

# Still capture
capture:
  min_interval: 0.18
  min_quality: 0.65
  min_mouth_quality: 0.55
  manual_requires_face_lock: true
  mode: auto
  planning_mode: esthetic
  preview_mode: point_cloud

# Coverage grid
coverage:
  azimuth_bins: 8
  elevation_bins: 4
  auto_stop_fraction: 0.85

# Point accumulation
points:
  global_cap: 600000
  head_cap: 350000
  head_expansion: 1.15
  head_skip_every: 3

# Per-frame throttling
throttle:
  vision_stride: 3
  preview_stride: 4

# Photogrammetry staging
reconstruction:
  max_samples: 140
  min_images: 20

# Still storage
storage:
  root: "Captures"
  jpeg_quality: 95
  write_depth: true
  write_metadata: true
  background_writes: false
"#;
