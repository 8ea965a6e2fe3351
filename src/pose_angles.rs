//! Camera viewing angles relative to the reference camera captured at face-lock.

use crate::geometry::Transform;
use nalgebra::Vector3;
use std::f32::consts::{FRAC_PI_2, PI};

/// Azimuth/elevation of a camera's viewing direction, in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewAngles {
    /// Rotation about the vertical axis, in `(-π, π]`
    pub azimuth: f32,
    /// Rotation up/down, in `[-π/2, π/2]`
    pub elevation: f32,
}

impl ViewAngles {
    /// Angles in degrees as `(azimuth, elevation)`
    #[must_use]
    pub fn to_degrees(self) -> (f32, f32) {
        (self.azimuth.to_degrees(), self.elevation.to_degrees())
    }

    /// Both angles mapped to `[0, 1]`
    #[must_use]
    pub fn normalized(self) -> (f32, f32) {
        (
            (self.azimuth + PI) / (2.0 * PI),
            (self.elevation + FRAC_PI_2) / PI,
        )
    }

    /// Angles of a forward (viewing) direction vector
    #[must_use]
    pub fn from_forward(forward: &Vector3<f32>) -> Self {
        let mut azimuth = forward.x.atan2(forward.z);
        // -π and π are the same direction; keep the half-open range
        if azimuth <= -PI {
            azimuth = PI;
        }
        let elevation = forward.y.clamp(-1.0, 1.0).asin();
        Self { azimuth, elevation }
    }
}

/// Viewing direction of a camera transform (its local −Z axis)
#[must_use]
pub fn forward_vector(transform: &Transform) -> Vector3<f32> {
    -Vector3::new(transform[(0, 2)], transform[(1, 2)], transform[(2, 2)])
}

/// Angles of `current` expressed in the frame of `reference`.
///
/// A singular reference is ignored and the current transform is used as-is.
#[must_use]
pub fn camera_angles(reference: &Transform, current: &Transform) -> ViewAngles {
    let relative = match reference.try_inverse() {
        Some(inverse) => inverse * current,
        None => {
            log::debug!("Reference transform is singular; using absolute camera pose");
            *current
        }
    };
    ViewAngles::from_forward(&forward_vector(&relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Translation3};

    fn yaw(angle: f32) -> Transform {
        Rotation3::from_axis_angle(&Vector3::y_axis(), angle).to_homogeneous()
    }

    fn pitch(angle: f32) -> Transform {
        Rotation3::from_axis_angle(&Vector3::x_axis(), angle).to_homogeneous()
    }

    #[test]
    fn test_reference_pose_looks_down_negative_z() {
        let angles = camera_angles(&Transform::identity(), &Transform::identity());
        assert!((angles.azimuth - PI).abs() < 1e-6);
        assert!(angles.elevation.abs() < 1e-6);
    }

    #[test]
    fn test_half_turn_faces_azimuth_zero() {
        let angles = camera_angles(&Transform::identity(), &yaw(PI));
        assert!(angles.azimuth.abs() < 1e-5);
        assert!(angles.elevation.abs() < 1e-5);
    }

    #[test]
    fn test_pitch_changes_elevation() {
        let angles = camera_angles(&Transform::identity(), &pitch(0.3));
        assert!((angles.elevation - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_angles_are_relative_to_reference() {
        let reference = yaw(0.7) * Translation3::new(0.2, 0.0, 0.5).to_homogeneous();
        let current = reference * yaw(PI);
        let angles = camera_angles(&reference, &current);
        assert!(angles.azimuth.abs() < 1e-4);
    }

    #[test]
    fn test_singular_reference_falls_back_to_current() {
        let angles = camera_angles(&Transform::zeros(), &yaw(PI));
        assert!(angles.azimuth.abs() < 1e-5);
    }

    #[test]
    fn test_normalized_angles_in_unit_range() {
        let (az, el) = ViewAngles { azimuth: 0.0, elevation: 0.0 }.normalized();
        assert!((az - 0.5).abs() < 1e-6);
        assert!((el - 0.5).abs() < 1e-6);

        let (deg_az, deg_el) = ViewAngles { azimuth: FRAC_PI_2, elevation: -FRAC_PI_2 }.to_degrees();
        assert!((deg_az - 90.0).abs() < 1e-4);
        assert!((deg_el + 90.0).abs() < 1e-4);
    }
}
