//! Capture core for dental face photogrammetry scans.
//!
//! This library turns a stream of tracked camera frames into a curated set
//! of stills ready for offline photogrammetry:
//! - Face-lock hysteresis on top of a pluggable face detector
//! - Still capture decisions gated on lock, timing and image quality
//! - Angular coverage tracking around the locked head with auto-stop
//! - Bounded per-bucket point accumulation and preview geometry
//! - Still persistence with depth and metadata sidecars
//! - Staging and cancellable background reconstruction jobs
//!
//! The per-frame pipeline consists of:
//! 1. Decoding the camera image
//! 2. Running the detector on every few frames and updating face-lock
//! 3. Scoring image quality and deciding whether to keep a still
//! 4. Accumulating tracked points relative to the locked reference
//! 5. Marking coverage and stopping once the head is covered
//!
//! # Examples
//!
//! ## Simulated Sweep
//!
//! ```no_run
//! use dental_face_scan::config::Config;
//! use dental_face_scan::detection::{Detection, FixedDetector};
//! use dental_face_scan::quality::SharpnessEvaluator;
//! use dental_face_scan::session::ScanSession;
//! use dental_face_scan::simulation::{self, OrbitSweep};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let sweep = OrbitSweep::default();
//!
//! let detector = FixedDetector::new(Some(Detection::new(sweep.face_box(), 0.9)));
//! let mut session = ScanSession::new(
//!     config.session_settings(),
//!     Box::new(detector),
//!     Box::new(SharpnessEvaluator::default()),
//!     Arc::new(config.image_store()),
//! );
//!
//! session.start();
//! let report = simulation::run(&mut session, &sweep);
//! println!("{} stills, {:.0}% coverage", report.stills, report.coverage * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Reconstruction
//!
//! ```no_run
//! use dental_face_scan::reconstruction::{
//!     ExternalCommandEngine, ReconstructionController, ReconstructionSettings,
//! };
//! use dental_face_scan::storage::ImageStore;
//! use dental_face_scan::types::CaptureBucket;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ImageStore::new("Captures");
//! let engine = ExternalCommandEngine::new("photogrammetry", Vec::new());
//! let mut controller = ReconstructionController::new(Arc::new(engine), ReconstructionSettings::default());
//!
//! controller.start(&store, CaptureBucket::Repose)?;
//! let status = controller.wait().await;
//! println!("{:?}: {}", status, controller.status_text());
//! # Ok(())
//! # }
//! ```

/// Camera frames, intrinsics and projection
pub mod camera;

/// Still capture policy and bookkeeping
pub mod capture_decision;

/// Configuration management
pub mod config;

/// Constants used throughout the library
pub mod constants;

/// Angular coverage grid around the locked head
pub mod coverage;

/// Face detection results and the detector seam
pub mod detection;

/// Error types and result handling
pub mod error;

/// Face-lock hysteresis and the reference frame
pub mod face_lock;

/// Rectangles, points and rigid transforms
pub mod geometry;

/// Bounded per-bucket point buffers
pub mod point_accumulator;

/// Azimuth and elevation of the camera around the reference
pub mod pose_angles;

/// Preview geometry built from accumulated points
pub mod preview;

/// Image quality scoring
pub mod quality;

/// Background photogrammetry jobs
pub mod reconstruction;

/// The per-frame scan pipeline
pub mod session;

/// Synthetic orbit sweeps for driving the pipeline without a device
pub mod simulation;

/// Still persistence and reconstruction staging
pub mod storage;

/// Buckets and mode enums
pub mod types;

/// Utility functions for pixel conversion and numeric casts
pub mod utils;

pub use error::{Error, Result};
