//! Live scan session: the strictly ordered per-frame pipeline.
//!
//! Each frame runs, in order: decode, throttled detection, face-lock update,
//! head-region gating rectangle, quality scoring, reference snapshot, capture
//! decision (and persistence), point accumulation, throttled preview rebuild
//! and coverage with the auto-stop check. Nothing in the frame loop returns an
//! error: collaborator failures are logged and the previous state is reused.

use crate::camera::{CameraFrame, Torch};
use crate::capture_decision::{CaptureDecisionEngine, CapturePolicy, CaptureProgress};
use crate::constants::{
    DEFAULT_AUTO_STOP_COVERAGE, DEFAULT_AZIMUTH_BINS, DEFAULT_ELEVATION_BINS, DEFAULT_LOCK_ACQUIRE_HITS,
    DEFAULT_LOCK_CONFIDENCE, DEFAULT_PREVIEW_STRIDE, DEFAULT_VISION_STRIDE,
};
use crate::coverage::{CoverageBin, CoverageTracker};
use crate::detection::{Detection, FaceDetector};
use crate::face_lock::{FaceLockState, LockTransition};
use crate::geometry::{head_rect, ImageSize, Rect};
use crate::point_accumulator::{AccumulatorSettings, IngestStats, PointAccumulator};
use crate::preview::PreviewGeometry;
use crate::quality::{QualityEvaluator, QualityScores};
use crate::storage::{CaptureMetadata, StillStorage};
use crate::types::{CaptureBucket, CaptureMode, PlanningMode, PreviewMode};
use image::RgbImage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Status shown when the session is ready to look for a face
pub const STATUS_ALIGN_FACE: &str = "Align patient face in view";
/// Status shown when face-lock is acquired
pub const STATUS_FACE_LOCKED: &str = "Face locked – start sweeping";
/// Terminal status after a coverage auto-stop
pub const STATUS_AUTO_STOP: &str = "Coverage complete – auto stop";

/// Tunables of a scan session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Run the detector every n-th frame
    pub vision_stride: u64,
    /// Rebuild the preview every n-th frame
    pub preview_stride: u64,
    /// Confidence a detection must exceed to count as a lock hit
    pub lock_confidence: f32,
    /// Hit count that must be exceeded to acquire lock
    pub lock_acquire_hits: u32,
    /// Capture thresholds
    pub capture: CapturePolicy,
    /// Coverage grid columns
    pub azimuth_bins: usize,
    /// Coverage grid rows
    pub elevation_bins: usize,
    /// Coverage fraction that allows an auto-stop
    pub auto_stop_coverage: f32,
    /// Point buffer settings
    pub points: AccumulatorSettings,
    /// Write the depth map next to each still when the frame has one
    pub write_depth: bool,
    /// Write capture metadata next to each still
    pub write_metadata: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            vision_stride: DEFAULT_VISION_STRIDE,
            preview_stride: DEFAULT_PREVIEW_STRIDE,
            lock_confidence: DEFAULT_LOCK_CONFIDENCE,
            lock_acquire_hits: DEFAULT_LOCK_ACQUIRE_HITS,
            capture: CapturePolicy::default(),
            azimuth_bins: DEFAULT_AZIMUTH_BINS,
            elevation_bins: DEFAULT_ELEVATION_BINS,
            auto_stop_coverage: DEFAULT_AUTO_STOP_COVERAGE,
            points: AccumulatorSettings::default(),
            write_depth: true,
            write_metadata: true,
        }
    }
}

/// What happened to one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    /// Frame went through the pipeline (session running and image decoded)
    pub processed: bool,
    /// Detector ran on this frame
    pub detection_ran: bool,
    /// Face-lock change caused by this frame
    pub lock: Option<LockTransition>,
    /// A still was accepted
    pub captured: bool,
    /// Where the still was written, if storage succeeded
    pub still: Option<PathBuf>,
    /// Points accepted by the accumulator
    pub points: IngestStats,
    /// Preview was rebuilt
    pub preview_rebuilt: bool,
    /// Coverage bin marked by this frame
    pub coverage_bin: Option<CoverageBin>,
    /// Session stopped itself on coverage
    pub auto_stopped: bool,
}

/// Point-in-time view of the session for UIs and logs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSnapshot {
    /// Session accepts frames
    pub running: bool,
    /// Active bucket
    pub bucket: Option<CaptureBucket>,
    /// Capture mode
    pub capture_mode: CaptureMode,
    /// Planning mode
    pub planning_mode: PlanningMode,
    /// Preview mode
    pub preview_mode: PreviewMode,
    /// Human-readable status line
    pub status: String,
    /// Frames seen since start
    pub frame_index: u64,
    /// Stills accepted for the active bucket
    pub frames_captured: usize,
    /// Stills wanted for the active bucket
    pub target_frames: usize,
    /// Capture progress indicators
    pub progress: CaptureProgress,
    /// Visited coverage fraction
    pub coverage: f32,
    /// Face-lock holds
    pub face_locked: bool,
    /// Face-lock hit counter
    pub lock_hits: u32,
    /// Last quality scores
    pub scores: QualityScores,
    /// Vertices in the current preview
    pub preview_points: usize,
    /// Torch state reported by the hardware
    pub torch_on: bool,
    /// Coverage auto-stop fired this session
    pub auto_stopped: bool,
}

/// A live capture session over one bucket at a time
pub struct ScanSession {
    settings: SessionSettings,
    detector: Box<dyn FaceDetector>,
    evaluator: Box<dyn QualityEvaluator>,
    storage: Arc<dyn StillStorage>,
    torch: Option<Box<dyn Torch>>,

    face_lock: FaceLockState,
    coverage: CoverageTracker,
    points: PointAccumulator,
    capture: CaptureDecisionEngine,

    running: bool,
    bucket: CaptureBucket,
    capture_mode: CaptureMode,
    planning_mode: PlanningMode,
    preview_mode: PreviewMode,

    frame_index: u64,
    pending_manual: bool,
    last_detection: Option<Detection>,
    scores: QualityScores,
    preview: Option<PreviewGeometry>,
    last_still: Option<PathBuf>,
    torch_on: bool,
    status: String,
    notifier: watch::Sender<ScanSnapshot>,
}

impl ScanSession {
    /// Create an idle session
    #[must_use]
    pub fn new(
        settings: SessionSettings,
        detector: Box<dyn FaceDetector>,
        evaluator: Box<dyn QualityEvaluator>,
        storage: Arc<dyn StillStorage>,
    ) -> Self {
        let (notifier, _) = watch::channel(ScanSnapshot::default());
        let mut session = Self {
            face_lock: FaceLockState::new(settings.lock_confidence, settings.lock_acquire_hits),
            coverage: CoverageTracker::new(
                settings.azimuth_bins,
                settings.elevation_bins,
                settings.auto_stop_coverage,
            ),
            points: PointAccumulator::new(settings.points),
            capture: CaptureDecisionEngine::new(settings.capture),
            settings,
            detector,
            evaluator,
            storage,
            torch: None,
            running: false,
            bucket: CaptureBucket::Repose,
            capture_mode: CaptureMode::default(),
            planning_mode: PlanningMode::default(),
            preview_mode: PreviewMode::default(),
            frame_index: 0,
            pending_manual: false,
            last_detection: None,
            scores: QualityScores::default(),
            preview: None,
            last_still: None,
            torch_on: false,
            status: "Ready".to_string(),
            notifier,
        };
        session.notify();
        session
    }

    /// Attach a torch device
    #[must_use]
    pub fn with_torch(mut self, torch: Box<dyn Torch>) -> Self {
        self.torch = Some(torch);
        self
    }

    /// Reset the active bucket and start accepting frames
    pub fn start(&mut self) {
        self.reset_bucket_state();
        self.running = true;
        log::info!("Scan started for {}", self.bucket);
        self.set_status(STATUS_ALIGN_FACE);
    }

    /// Stop accepting frames and switch the torch off
    pub fn stop(&mut self) {
        self.halt();
        self.set_status("Scan stopped");
    }

    /// Clear the active bucket's samples without changing the running flag
    pub fn reset(&mut self) {
        self.reset_bucket_state();
        let status = format!("Reset {}", self.bucket);
        self.set_status(&status);
    }

    /// Run the per-frame pipeline on one camera frame
    pub fn process_frame(&mut self, frame: &CameraFrame) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        if !self.running {
            return outcome;
        }
        // 1. Frame index and decode
        self.frame_index = self.frame_index.wrapping_add(1);
        let image = match frame.image.decode() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Skipping frame {}: {}", self.frame_index, e);
                return outcome;
            }
        };
        outcome.processed = true;
        let size = ImageSize::new(image.width(), image.height());
        let force_manual = std::mem::take(&mut self.pending_manual);

        // 2. Throttled detection
        if self.frame_index % self.settings.vision_stride.max(1) == 0 {
            outcome.detection_ran = true;
            self.last_detection = match self.detector.detect(&image) {
                Ok(detection) => detection,
                Err(e) => {
                    log::warn!("Face detection failed: {}", e);
                    None
                }
            };
        }
        let detection = self.last_detection.clone();

        // 3. Face-lock
        let transition = self
            .face_lock
            .update(detection.as_ref().map(|d| d.confidence), &frame.camera.transform);
        match transition {
            LockTransition::Acquired => self.set_status_quiet(STATUS_FACE_LOCKED),
            LockTransition::Released => self.set_status_quiet(STATUS_ALIGN_FACE),
            LockTransition::Unchanged => {}
        }
        outcome.lock = Some(transition);

        // 4. Head rectangle, gating only
        let head_region: Option<Rect> = detection
            .as_ref()
            .map(|d| head_rect(d.face_box_pixels(size), size).normalized(size));
        let mouth_region = detection.as_ref().and_then(|d| d.mouth_region);

        // 5. Quality
        match self.evaluator.score(&image, mouth_region) {
            Ok(scores) => self.scores = scores,
            Err(e) => log::warn!("Quality evaluation failed: {}", e),
        }

        // 6. Reference frame
        self.face_lock.ensure_reference(&frame.camera.transform);
        let locked = self.face_lock.is_locked();

        // 7. Capture decision
        if self.capture.decide(
            frame.timestamp,
            locked,
            self.scores.quality,
            self.scores.mouth_quality,
            force_manual,
            self.capture_mode,
        ) {
            outcome.captured = true;
            outcome.still = self.persist_still(frame, &image, mouth_region);
            self.capture
                .record_capture(frame.timestamp, self.bucket, self.planning_mode);

            if outcome.still.is_none() {
                self.set_status_quiet("Failed to save photo");
            } else if force_manual {
                self.set_status_quiet("Manual photo captured");
            } else {
                let status = format!("Frame {} captured", self.capture.frames_captured(self.bucket));
                self.set_status_quiet(&status);
            }
        } else if force_manual {
            log::debug!("Manual capture ignored without face lock");
        }

        // 8. Point accumulation
        if let Some(raw) = &frame.raw_feature_points {
            outcome.points = self.points.ingest(
                self.bucket,
                raw,
                head_region,
                &frame.camera,
                size,
                self.face_lock.reference(),
            );
        }

        // 9. Throttled preview
        if self.frame_index % self.settings.preview_stride.max(1) == 0 {
            outcome.preview_rebuilt = self.rebuild_preview();
        }

        // 10. Coverage and auto-stop
        if locked {
            if let Some(reference) = self.face_lock.reference().copied() {
                outcome.coverage_bin = Some(self.coverage.mark(&reference.transform, &frame.camera.transform));

                let frames = self.capture.frames_captured(self.bucket);
                let target = self.planning_mode.target_frame_count();
                if self.coverage.should_auto_stop(self.capture_mode, frames, target) {
                    outcome.auto_stopped = true;
                    self.halt();
                    log::info!(
                        "Auto-stop at {:.0}% coverage with {} stills",
                        self.coverage.coverage_fraction() * 100.0,
                        frames
                    );
                    self.set_status_quiet(STATUS_AUTO_STOP);
                }
            }
        }

        self.notify();
        outcome
    }

    /// Force a still on the next decodable frame (if face-lock holds then)
    pub fn request_manual_capture(&mut self) {
        self.pending_manual = true;
    }

    /// Switch the active bucket
    pub fn set_bucket(&mut self, bucket: CaptureBucket) {
        self.bucket = bucket;
        self.capture.refresh_progress(bucket, self.planning_mode);
        self.preview = None;
        self.notify();
    }

    /// Switch between automatic and manual capture
    pub fn set_capture_mode(&mut self, mode: CaptureMode) {
        self.capture_mode = mode;
        self.notify();
    }

    /// Switch planning mode; progress is re-evaluated against the new target
    pub fn set_planning_mode(&mut self, mode: PlanningMode) {
        self.planning_mode = mode;
        self.capture.refresh_progress(self.bucket, mode);
        self.notify();
    }

    /// Switch preview mode and rebuild the preview
    pub fn set_preview_mode(&mut self, mode: PreviewMode) {
        self.preview_mode = mode;
        self.rebuild_preview();
        self.notify();
    }

    /// Rebuild the preview from the active bucket's points
    pub fn build_preview(&mut self) -> Option<&PreviewGeometry> {
        self.rebuild_preview();
        self.set_status("Preview updated");
        self.preview.as_ref()
    }

    /// Report how many stills the active bucket holds
    pub fn commit_bucket(&mut self) {
        let status = format!(
            "State {} images saved ({} frames)",
            self.bucket,
            self.capture.frames_captured(self.bucket)
        );
        self.set_status(&status);
    }

    /// Store an externally captured high-resolution teeth close-up
    pub fn capture_macro_still(&mut self, image: &RgbImage) -> Option<PathBuf> {
        if !self.running {
            return None;
        }
        let path = self.storage.write(image, CaptureBucket::TeethMacro);
        if path.is_some() {
            self.set_status("Macro teeth photo captured");
        } else {
            self.set_status("Failed to save macro photo");
        }
        path
    }

    /// Store an externally captured high-resolution still in the active bucket
    pub fn record_external_still(&mut self, image: &RgbImage) -> Option<PathBuf> {
        if !self.running {
            return None;
        }
        let path = self.storage.write(image, self.bucket);
        if path.is_some() {
            self.capture.record_external(self.bucket, self.planning_mode);
            self.last_still.clone_from(&path);
            self.set_status("Manual photo captured");
        } else {
            self.set_status("Failed to save photo");
        }
        path
    }

    /// Switch the torch, recording the state the hardware actually reports
    pub fn set_torch(&mut self, enabled: bool) {
        self.apply_torch(enabled);
        self.notify();
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            running: self.running,
            bucket: Some(self.bucket),
            capture_mode: self.capture_mode,
            planning_mode: self.planning_mode,
            preview_mode: self.preview_mode,
            status: self.status.clone(),
            frame_index: self.frame_index,
            frames_captured: self.capture.frames_captured(self.bucket),
            target_frames: self.planning_mode.target_frame_count(),
            progress: self.capture.progress(),
            coverage: self.coverage.coverage_fraction(),
            face_locked: self.face_lock.is_locked(),
            lock_hits: self.face_lock.hits(),
            scores: self.scores,
            preview_points: self.preview.as_ref().map_or(0, PreviewGeometry::len),
            torch_on: self.torch_on,
            auto_stopped: self.coverage.auto_stop_fired(),
        }
    }

    /// Receiver notified after every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.notifier.subscribe()
    }

    /// Whether frames are accepted
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Active bucket
    #[must_use]
    pub fn bucket(&self) -> CaptureBucket {
        self.bucket
    }

    /// Status line
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Last live preview
    #[must_use]
    pub fn preview(&self) -> Option<&PreviewGeometry> {
        self.preview.as_ref()
    }

    /// Accumulated points
    #[must_use]
    pub fn points(&self) -> &PointAccumulator {
        &self.points
    }

    /// Coverage meter
    #[must_use]
    pub fn coverage(&self) -> &CoverageTracker {
        &self.coverage
    }

    /// Face-lock state
    #[must_use]
    pub fn face_lock(&self) -> &FaceLockState {
        &self.face_lock
    }

    /// Capture counters
    #[must_use]
    pub fn capture(&self) -> &CaptureDecisionEngine {
        &self.capture
    }

    /// Path of the most recent still
    #[must_use]
    pub fn last_still(&self) -> Option<&PathBuf> {
        self.last_still.as_ref()
    }

    /// Shared still storage
    #[must_use]
    pub fn storage(&self) -> Arc<dyn StillStorage> {
        Arc::clone(&self.storage)
    }

    fn persist_still(&mut self, frame: &CameraFrame, image: &RgbImage, mouth_region: Option<Rect>) -> Option<PathBuf> {
        let metadata = self.settings.write_metadata.then(|| {
            CaptureMetadata::new(
                frame.timestamp,
                self.bucket,
                &frame.camera.transform,
                frame.camera.intrinsics,
                self.scores,
                mouth_region,
            )
        });
        let depth = frame.depth.as_ref().filter(|_| self.settings.write_depth);

        let path = self
            .storage
            .write_with_depth(image, depth, metadata.as_ref(), self.bucket);
        if path.is_some() {
            self.last_still.clone_from(&path);
        }
        path
    }

    fn rebuild_preview(&mut self) -> bool {
        let points = self.points.preview_points(self.bucket);
        if points.is_empty() {
            return false;
        }
        self.preview = Some(PreviewGeometry::build(&points, self.preview_mode));
        true
    }

    fn reset_bucket_state(&mut self) {
        self.points.clear(self.bucket);
        self.capture.reset_bucket(self.bucket);
        self.face_lock.reset();
        self.coverage.reset();
        self.frame_index = 0;
        self.pending_manual = false;
        self.last_detection = None;
        self.scores = QualityScores::default();
        self.preview = None;
        self.last_still = None;
        self.storage.clear(self.bucket);
    }

    fn halt(&mut self) {
        self.running = false;
        self.apply_torch(false);
    }

    fn apply_torch(&mut self, enabled: bool) {
        let Some(torch) = self.torch.as_mut().filter(|t| t.is_available()) else {
            self.torch_on = false;
            return;
        };
        self.torch_on = match torch.set(enabled) {
            Ok(()) => enabled,
            Err(e) => {
                log::warn!("Torch configuration failed: {}", e);
                torch.is_on()
            }
        };
    }

    fn set_status(&mut self, status: &str) {
        self.set_status_quiet(status);
        self.notify();
    }

    fn set_status_quiet(&mut self, status: &str) {
        if self.status != status {
            log::debug!("Status: {}", status);
            status.clone_into(&mut self.status);
        }
    }

    fn notify(&self) {
        self.notifier.send_replace(self.snapshot());
    }
}
