//! Face-lock hysteresis and reference frame tests

use dental_face_scan::face_lock::{FaceLockState, LockTransition};
use dental_face_scan::geometry::Transform;
use nalgebra::{Matrix4, Translation3};
use proptest::prelude::*;

fn pose() -> Transform {
    Translation3::new(0.1, 0.2, 0.5).to_homogeneous()
}

#[test]
fn test_ninth_hit_acquires_lock() {
    let mut lock = FaceLockState::new(0.6, 8);
    for _ in 0..8 {
        assert_eq!(lock.update(Some(0.9), &pose()), LockTransition::Unchanged);
    }
    assert!(!lock.is_locked());
    assert_eq!(lock.update(Some(0.9), &pose()), LockTransition::Acquired);
    assert!(lock.is_locked());
    assert_eq!(lock.reference().unwrap().transform, pose());
}

#[test]
fn test_confidence_must_exceed_threshold() {
    let mut lock = FaceLockState::new(0.6, 8);
    for _ in 0..50 {
        lock.update(Some(0.6), &pose());
    }
    assert_eq!(lock.hits(), 0);
    assert!(!lock.is_locked());
}

#[test]
fn test_lock_survives_until_counter_drains() {
    let mut lock = FaceLockState::new(0.6, 8);
    for _ in 0..12 {
        lock.update(Some(0.95), &pose());
    }
    assert_eq!(lock.hits(), 12);

    for _ in 0..11 {
        assert_eq!(lock.update(None, &pose()), LockTransition::Unchanged);
        assert!(lock.is_locked());
    }
    assert_eq!(lock.update(Some(0.1), &pose()), LockTransition::Released);
    assert!(!lock.is_locked());
    assert!(lock.reference().is_none());
}

#[test]
fn test_reference_kept_while_locked() {
    let mut lock = FaceLockState::new(0.6, 8);
    for _ in 0..9 {
        lock.update(Some(0.9), &pose());
    }
    let moved = Translation3::new(1.0, 0.0, 0.0).to_homogeneous();
    lock.update(Some(0.9), &moved);
    assert!(!lock.ensure_reference(&moved));
    assert_eq!(lock.reference().unwrap().transform, pose());
}

#[test]
fn test_singular_pose_defers_reference() {
    let mut lock = FaceLockState::new(0.6, 8);
    for _ in 0..9 {
        lock.update(Some(0.9), &Matrix4::zeros());
    }
    assert!(lock.is_locked());
    assert!(lock.reference().is_none());
    assert!(lock.ensure_reference(&pose()));
    assert!(lock.reference().is_some());
}

proptest! {
    #[test]
    fn prop_reference_present_only_when_locked(
        confidences in prop::collection::vec(prop::option::of(0.0f32..1.0), 0..200)
    ) {
        let mut lock = FaceLockState::new(0.6, 8);
        for c in confidences {
            lock.update(c, &pose());
            if !lock.is_locked() {
                prop_assert!(lock.reference().is_none());
            }
            if lock.is_locked() {
                prop_assert!(lock.hits() > 0);
            }
        }
    }

    #[test]
    fn prop_hits_track_hits_minus_misses(hits in 0u32..40, misses in 0u32..40) {
        let mut lock = FaceLockState::new(0.6, 8);
        for _ in 0..hits {
            lock.update(Some(0.99), &pose());
        }
        for _ in 0..misses {
            lock.update(None, &pose());
        }
        prop_assert_eq!(lock.hits(), hits.saturating_sub(misses));
    }
}
