//! Capture decision policy tests

use dental_face_scan::capture_decision::{CaptureDecisionEngine, CapturePolicy};
use dental_face_scan::types::{CaptureBucket, CaptureMode, PlanningMode};
use proptest::prelude::*;

#[test]
fn test_auto_capture_needs_every_gate() {
    let engine = CaptureDecisionEngine::default();
    let auto = CaptureMode::Auto;
    assert!(engine.should_capture(1.0, true, 0.7, 0.6, false, auto, None));
    assert!(!engine.should_capture(1.0, false, 0.7, 0.6, false, auto, None));
    assert!(!engine.should_capture(1.0, true, 0.6, 0.6, false, auto, None));
    assert!(!engine.should_capture(1.0, true, 0.7, 0.5, false, auto, None));
    assert!(!engine.should_capture(1.0, true, 0.7, 0.6, false, auto, Some(0.9)));
    assert!(engine.should_capture(1.0, true, 0.7, 0.6, false, auto, Some(0.5)));
}

#[test]
fn test_thresholds_are_inclusive() {
    let engine = CaptureDecisionEngine::default();
    assert!(engine.should_capture(2.0, true, 0.65, 0.55, false, CaptureMode::Auto, Some(1.0)));
}

#[test]
fn test_manual_mode_waits_for_shutter() {
    let engine = CaptureDecisionEngine::default();
    assert!(!engine.should_capture(1.0, true, 1.0, 1.0, false, CaptureMode::Manual, None));
    assert!(engine.should_capture(1.0, true, 0.0, 0.0, true, CaptureMode::Manual, Some(0.99)));
}

#[test]
fn test_manual_lock_requirement_is_configurable() {
    let strict = CaptureDecisionEngine::default();
    assert!(!strict.should_capture(1.0, false, 1.0, 1.0, true, CaptureMode::Manual, None));

    let relaxed = CaptureDecisionEngine::new(CapturePolicy {
        manual_requires_face_lock: false,
        ..CapturePolicy::default()
    });
    assert!(relaxed.should_capture(1.0, false, 1.0, 1.0, true, CaptureMode::Manual, None));
}

#[test]
fn test_progress_tracks_planning_target() {
    let mut engine = CaptureDecisionEngine::default();
    for i in 0..40u32 {
        engine.record_capture(f64::from(i), CaptureBucket::Smile, PlanningMode::Esthetic);
    }
    assert_eq!(engine.frames_captured(CaptureBucket::Smile), 40);
    assert!((engine.progress().azimuth - 0.5).abs() < 1e-6);

    engine.refresh_progress(CaptureBucket::Smile, PlanningMode::FullArch);
    assert!((engine.progress().elevation - 40.0 / 120.0).abs() < 1e-6);

    engine.refresh_progress(CaptureBucket::Repose, PlanningMode::Esthetic);
    assert!(engine.progress().azimuth.abs() < f32::EPSILON);
}

#[test]
fn test_progress_saturates_at_one() {
    let mut engine = CaptureDecisionEngine::default();
    for _ in 0..100 {
        engine.record_external(CaptureBucket::Profile, PlanningMode::Esthetic);
    }
    assert!((engine.progress().azimuth - 1.0).abs() < f32::EPSILON);
    assert!(engine.last_capture().is_none());
}

#[test]
fn test_reset_bucket_clears_clock() {
    let mut engine = CaptureDecisionEngine::default();
    engine.record_capture(3.0, CaptureBucket::Repose, PlanningMode::Esthetic);
    engine.reset_bucket(CaptureBucket::Repose);
    assert_eq!(engine.frames_captured(CaptureBucket::Repose), 0);
    assert!(engine.last_capture().is_none());
    assert!(engine.decide(3.01, true, 1.0, 1.0, false, CaptureMode::Auto));
}

proptest! {
    #[test]
    fn prop_unlocked_auto_never_captures(
        now in 0.0f64..1000.0,
        quality in 0.0f32..1.0,
        mouth in 0.0f32..1.0,
    ) {
        let engine = CaptureDecisionEngine::default();
        prop_assert!(!engine.should_capture(now, false, quality, mouth, false, CaptureMode::Auto, None));
    }

    #[test]
    fn prop_interval_is_respected(last in 0.0f64..100.0, gap in 0.0f64..0.17) {
        let engine = CaptureDecisionEngine::default();
        prop_assert!(!engine.should_capture(last + gap, true, 1.0, 1.0, false, CaptureMode::Auto, Some(last)));
    }
}
