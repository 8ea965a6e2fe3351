//! Face-lock hysteresis and the reference camera anchor.
//!
//! Per-frame detection confidence is noisy. A saturating hit counter turns it
//! into a stable "locked" flag: lock is acquired once the counter exceeds the
//! acquire threshold and released only when it decays back to zero. The camera
//! pose at acquisition becomes the reference frame for points and angles.

use crate::constants::{DEFAULT_LOCK_ACQUIRE_HITS, DEFAULT_LOCK_CONFIDENCE};
use crate::geometry::{invert, Transform};

/// Camera pose captured at lock time, with its inverse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    /// Camera-to-world transform at lock time
    pub transform: Transform,
    /// World-to-reference-camera transform
    pub inverse: Transform,
}

impl ReferenceFrame {
    /// Anchor a reference frame, `None` when the pose is not invertible
    #[must_use]
    pub fn new(transform: Transform) -> Option<Self> {
        invert(&transform).map(|inverse| Self { transform, inverse })
    }
}

/// Lock change produced by one update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTransition {
    /// Lock acquired on this update
    Acquired,
    /// Lock released on this update
    Released,
    /// No change
    Unchanged,
}

/// Hysteresis state machine for face-lock
#[derive(Debug, Clone)]
pub struct FaceLockState {
    confidence_threshold: f32,
    acquire_hits: u32,
    hits: u32,
    locked: bool,
    reference: Option<ReferenceFrame>,
}

impl Default for FaceLockState {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_CONFIDENCE, DEFAULT_LOCK_ACQUIRE_HITS)
    }
}

impl FaceLockState {
    /// Create a lock state.
    ///
    /// A detection counts as a hit when its confidence is strictly greater
    /// than `confidence_threshold`; lock is acquired when the hit counter is
    /// strictly greater than `acquire_hits`.
    #[must_use]
    pub fn new(confidence_threshold: f32, acquire_hits: u32) -> Self {
        Self {
            confidence_threshold,
            acquire_hits,
            hits: 0,
            locked: false,
            reference: None,
        }
    }

    /// Feed one frame's detection confidence (`None` when no face was found).
    ///
    /// `camera` is the current camera pose, anchored as the reference frame
    /// when lock is acquired and no reference exists yet.
    pub fn update(&mut self, confidence: Option<f32>, camera: &Transform) -> LockTransition {
        match confidence {
            Some(c) if c > self.confidence_threshold => {
                self.hits = self.hits.saturating_add(1);
            }
            _ => {
                self.hits = self.hits.saturating_sub(1);
                if self.hits == 0 && self.locked {
                    self.locked = false;
                    self.reference = None;
                    log::info!("Face lock lost");
                    return LockTransition::Released;
                }
            }
        }

        if !self.locked && self.hits > self.acquire_hits {
            self.locked = true;
            if self.reference.is_none() {
                self.reference = ReferenceFrame::new(*camera);
                if self.reference.is_none() {
                    log::warn!("Camera pose at face lock is not invertible; reference deferred");
                }
            }
            log::info!("Face lock acquired after {} hits", self.hits);
            return LockTransition::Acquired;
        }

        LockTransition::Unchanged
    }

    /// Anchor the reference frame if lock holds and none exists yet.
    ///
    /// Returns `true` when a reference was created by this call.
    pub fn ensure_reference(&mut self, camera: &Transform) -> bool {
        if self.locked && self.reference.is_none() {
            self.reference = ReferenceFrame::new(*camera);
            return self.reference.is_some();
        }
        false
    }

    /// Whether face-lock currently holds
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Current hit counter
    #[must_use]
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Reference frame, present only while locked
    #[must_use]
    pub fn reference(&self) -> Option<&ReferenceFrame> {
        self.reference.as_ref()
    }

    /// Clear counter, lock and reference
    pub fn reset(&mut self) {
        self.hits = 0;
        self.locked = false;
        self.reference = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Translation3;

    fn pose() -> Transform {
        Translation3::new(0.1, 0.2, 0.3).to_homogeneous()
    }

    #[test]
    fn test_lock_acquired_on_ninth_hit() {
        let mut lock = FaceLockState::default();
        for i in 1..=10 {
            let transition = lock.update(Some(0.9), &pose());
            if i < 9 {
                assert!(!lock.is_locked(), "locked too early at hit {i}");
                assert_eq!(transition, LockTransition::Unchanged);
            } else if i == 9 {
                assert_eq!(transition, LockTransition::Acquired);
            } else {
                assert_eq!(transition, LockTransition::Unchanged);
            }
        }
        assert!(lock.is_locked());
        assert_eq!(lock.reference().unwrap().transform, pose());
    }

    #[test]
    fn test_low_confidence_decrements() {
        let mut lock = FaceLockState::default();
        lock.update(Some(0.9), &pose());
        lock.update(Some(0.9), &pose());
        lock.update(Some(0.6), &pose());
        assert_eq!(lock.hits(), 1);
    }

    #[test]
    fn test_counter_never_negative() {
        let mut lock = FaceLockState::default();
        for _ in 0..5 {
            lock.update(None, &pose());
        }
        assert_eq!(lock.hits(), 0);
    }

    #[test]
    fn test_release_only_at_zero() {
        let mut lock = FaceLockState::default();
        for _ in 0..12 {
            lock.update(Some(0.95), &pose());
        }
        assert_eq!(lock.hits(), 12);

        for _ in 0..11 {
            assert_eq!(lock.update(None, &pose()), LockTransition::Unchanged);
            assert!(lock.is_locked());
        }
        assert_eq!(lock.update(None, &pose()), LockTransition::Released);
        assert!(!lock.is_locked());
        assert!(lock.reference().is_none());
    }

    #[test]
    fn test_reference_not_replaced_while_locked() {
        let mut lock = FaceLockState::default();
        for _ in 0..9 {
            lock.update(Some(0.9), &pose());
        }
        let other = Translation3::new(5.0, 5.0, 5.0).to_homogeneous();
        lock.update(Some(0.9), &other);
        assert!(!lock.ensure_reference(&other));
        assert_eq!(lock.reference().unwrap().transform, pose());
    }

    #[test]
    fn test_singular_pose_defers_reference() {
        let mut lock = FaceLockState::default();
        for _ in 0..9 {
            lock.update(Some(0.9), &Transform::zeros());
        }
        assert!(lock.is_locked());
        assert!(lock.reference().is_none());
        assert!(lock.ensure_reference(&pose()));
        assert!(lock.reference().is_some());
    }
}
