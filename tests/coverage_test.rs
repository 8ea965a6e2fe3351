//! Coverage grid, viewing angles and auto-stop tests

use dental_face_scan::coverage::{CoverageMap, CoverageTracker};
use dental_face_scan::geometry::Transform;
use dental_face_scan::pose_angles::{camera_angles, ViewAngles};
use dental_face_scan::types::CaptureMode;
use nalgebra::{Rotation3, Vector3};
use std::f32::consts::PI;

fn orbit(azimuth_deg: f32, elevation_deg: f32) -> Transform {
    Rotation3::from_axis_angle(&Vector3::y_axis(), azimuth_deg.to_radians()).to_homogeneous()
        * Rotation3::from_axis_angle(&Vector3::x_axis(), elevation_deg.to_radians()).to_homogeneous()
}

#[test]
fn test_reference_pose_maps_to_positive_pi() {
    let angles = camera_angles(&Transform::identity(), &Transform::identity());
    assert!((angles.azimuth - PI).abs() < 1e-6);
    assert!(angles.elevation.abs() < 1e-6);
}

#[test]
fn test_elevation_follows_pitch() {
    for elevation in [-60.0f32, -20.0, 20.0, 60.0] {
        let angles = camera_angles(&Transform::identity(), &orbit(0.0, elevation));
        assert!((angles.elevation.to_degrees() - elevation).abs() < 1e-3);
    }
}

#[test]
fn test_full_sweep_covers_every_bin() {
    let mut tracker = CoverageTracker::default();
    let reference = Transform::identity();
    for row in [-60.0f32, -20.0, 20.0, 60.0] {
        for k in 0..8u8 {
            tracker.mark(&reference, &orbit(f32::from(k) * 45.0 + 22.5, row));
        }
    }
    assert!(tracker.map().is_complete());
    assert!((tracker.coverage_fraction() - 1.0).abs() < f32::EPSILON);
}

#[test]
fn test_bins_are_clamped_at_the_edges() {
    let map = CoverageMap::default();
    let top = map.bin_for(ViewAngles {
        azimuth: PI,
        elevation: PI / 2.0,
    });
    assert_eq!(top, (7, 3));
    let bottom = map.bin_for(ViewAngles {
        azimuth: -PI + 1e-4,
        elevation: -PI / 2.0,
    });
    assert_eq!(bottom, (0, 0));
}

#[test]
fn test_auto_stop_needs_coverage_and_half_target() {
    let mut tracker = CoverageTracker::default();
    let reference = Transform::identity();
    for row in [-60.0f32, -20.0, 20.0, 60.0] {
        for k in 0..7u8 {
            tracker.mark(&reference, &orbit(f32::from(k) * 45.0 + 22.5, row));
        }
    }
    // 28 of 32 bins
    assert!((tracker.coverage_fraction() - 0.875).abs() < 1e-6);

    assert!(!tracker.should_auto_stop(CaptureMode::Auto, 39, 80));
    assert!(!tracker.should_auto_stop(CaptureMode::Manual, 40, 80));
    assert!(tracker.should_auto_stop(CaptureMode::Auto, 40, 80));
    // Latched
    assert!(!tracker.should_auto_stop(CaptureMode::Auto, 80, 80));
    assert!(tracker.auto_stop_fired());

    tracker.reset();
    assert!(!tracker.auto_stop_fired());
    assert_eq!(tracker.map().visited_count(), 0);
}

#[test]
fn test_low_coverage_never_stops() {
    let mut tracker = CoverageTracker::default();
    let reference = Transform::identity();
    for k in 0..8u8 {
        tracker.mark(&reference, &orbit(f32::from(k) * 45.0 + 22.5, 0.0));
    }
    assert!((tracker.coverage_fraction() - 0.25).abs() < 1e-6);
    assert!(!tracker.should_auto_stop(CaptureMode::Auto, 120, 80));
}
