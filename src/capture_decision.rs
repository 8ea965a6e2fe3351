//! Per-frame still capture policy and capture progress counters.

use crate::constants::{DEFAULT_MIN_CAPTURE_INTERVAL, DEFAULT_MIN_MOUTH_QUALITY, DEFAULT_MIN_QUALITY};
use crate::types::{BucketMap, CaptureBucket, CaptureMode, PlanningMode};
use crate::utils::safe_cast::fraction;
use serde::{Deserialize, Serialize};

/// Thresholds that gate a still capture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturePolicy {
    /// Minimum seconds between automatic captures
    pub min_interval: f64,
    /// Minimum whole-frame quality score
    pub min_quality: f32,
    /// Minimum mouth-region quality score
    pub min_mouth_quality: f32,
    /// Whether a manual shutter press needs face-lock
    pub manual_requires_face_lock: bool,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_CAPTURE_INTERVAL,
            min_quality: DEFAULT_MIN_QUALITY,
            min_mouth_quality: DEFAULT_MIN_MOUTH_QUALITY,
            manual_requires_face_lock: true,
        }
    }
}

/// Capture progress toward the planning target, per indicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureProgress {
    /// Azimuth sweep indicator in `[0, 1]`
    pub azimuth: f32,
    /// Elevation sweep indicator in `[0, 1]`
    pub elevation: f32,
}

/// Capture decision plus per-bucket counters
#[derive(Debug, Clone)]
pub struct CaptureDecisionEngine {
    policy: CapturePolicy,
    frames: BucketMap<usize>,
    last_capture: Option<f64>,
    progress: CaptureProgress,
}

impl Default for CaptureDecisionEngine {
    fn default() -> Self {
        Self::new(CapturePolicy::default())
    }
}

impl CaptureDecisionEngine {
    /// Create an engine with zeroed counters
    #[must_use]
    pub fn new(policy: CapturePolicy) -> Self {
        Self {
            policy,
            frames: BucketMap::default(),
            last_capture: None,
            progress: CaptureProgress::default(),
        }
    }

    /// Active thresholds
    #[must_use]
    pub fn policy(&self) -> &CapturePolicy {
        &self.policy
    }

    /// Decide whether the current frame becomes a still.
    ///
    /// A forced manual capture bypasses timing and quality thresholds but
    /// still needs face-lock unless the policy says otherwise. Automatic mode
    /// needs the minimum interval since `last_capture` (no previous capture
    /// counts as elapsed), face-lock and both quality thresholds. Manual mode
    /// without a shutter press never captures.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn should_capture(
        &self,
        now: f64,
        face_locked: bool,
        quality: f32,
        mouth_quality: f32,
        force_manual: bool,
        mode: CaptureMode,
        last_capture: Option<f64>,
    ) -> bool {
        if force_manual {
            return face_locked || !self.policy.manual_requires_face_lock;
        }
        if mode != CaptureMode::Auto {
            return false;
        }

        let interval_ok = last_capture.map_or(true, |last| now - last >= self.policy.min_interval);
        interval_ok
            && face_locked
            && quality >= self.policy.min_quality
            && mouth_quality >= self.policy.min_mouth_quality
    }

    /// Same decision using the engine's own last-capture timestamp
    #[must_use]
    pub fn decide(
        &self,
        now: f64,
        face_locked: bool,
        quality: f32,
        mouth_quality: f32,
        force_manual: bool,
        mode: CaptureMode,
    ) -> bool {
        self.should_capture(
            now,
            face_locked,
            quality,
            mouth_quality,
            force_manual,
            mode,
            self.last_capture,
        )
    }

    /// Account for an accepted still and refresh progress
    pub fn record_capture(&mut self, now: f64, bucket: CaptureBucket, planning: PlanningMode) {
        self.last_capture = Some(now);
        self.frames[bucket] += 1;
        self.refresh_progress(bucket, planning);
    }

    /// Account for a still captured outside the frame loop (no timestamp change)
    pub fn record_external(&mut self, bucket: CaptureBucket, planning: PlanningMode) {
        self.frames[bucket] += 1;
        self.refresh_progress(bucket, planning);
    }

    /// Recompute progress for the given bucket against the planning target
    pub fn refresh_progress(&mut self, bucket: CaptureBucket, planning: PlanningMode) {
        let value = fraction(self.frames[bucket], planning.target_frame_count());
        self.progress = CaptureProgress {
            azimuth: value,
            elevation: value,
        };
    }

    /// Stills accepted for a bucket
    #[must_use]
    pub fn frames_captured(&self, bucket: CaptureBucket) -> usize {
        self.frames[bucket]
    }

    /// Timestamp of the last accepted frame
    #[must_use]
    pub fn last_capture(&self) -> Option<f64> {
        self.last_capture
    }

    /// Current progress indicators
    #[must_use]
    pub fn progress(&self) -> CaptureProgress {
        self.progress
    }

    /// Zero a bucket's counter, the capture clock and progress
    pub fn reset_bucket(&mut self, bucket: CaptureBucket) {
        self.frames[bucket] = 0;
        self.last_capture = None;
        self.progress = CaptureProgress::default();
    }
}
