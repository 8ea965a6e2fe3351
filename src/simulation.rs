//! Synthetic scan sweeps for exercising the pipeline without a device.
//!
//! The camera orbits a spherical "head" at the world origin, ring by ring,
//! always looking at its center. Each frame carries a textured image,
//! tracked feature points sampled from the head surface and a pose.

use crate::camera::{CameraFrame, CameraIntrinsics, FrameCamera, PixelBuffer};
use crate::geometry::{ImageSize, Point, Rect, Transform};
use crate::session::ScanSession;
use image::{Rgb, RgbImage};
use nalgebra::{Rotation3, Translation3, Vector3};
use serde::Serialize;
use std::f32::consts::PI;

/// Size of the point pool frames sample from
const SURFACE_POOL: usize = 4096;

/// Orbit parameters
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitSweep {
    /// Number of frames
    pub frames: usize,
    /// Frame rate
    pub fps: f64,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Tracked points per frame
    pub points_per_frame: usize,
    /// Camera distance from the head center, meters
    pub orbit_radius: f32,
    /// Head sphere radius, meters
    pub head_radius: f32,
    /// Elevation of each ring, degrees
    pub rings: Vec<f32>,
    /// Every n-th frame is motion-blurred (0 disables)
    pub blur_every: usize,
}

impl Default for OrbitSweep {
    fn default() -> Self {
        Self {
            frames: 600,
            fps: 30.0,
            width: 160,
            height: 120,
            points_per_frame: 256,
            orbit_radius: 0.5,
            head_radius: 0.1,
            rings: vec![0.0, 30.0, -30.0, 60.0, -60.0],
            blur_every: 7,
        }
    }
}

impl OrbitSweep {
    /// Camera pose of a frame
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pose(&self, index: usize) -> Transform {
        let rings = self.rings.len().max(1);
        let per_ring = (self.frames / rings).max(1);
        let ring = (index / per_ring).min(rings - 1);
        let step = index - ring * per_ring;

        let azimuth = 2.0 * PI * step as f32 / per_ring as f32;
        let elevation = self.rings.get(ring).copied().unwrap_or(0.0).to_radians();

        Rotation3::from_axis_angle(&Vector3::y_axis(), azimuth).to_homogeneous()
            * Rotation3::from_axis_angle(&Vector3::x_axis(), elevation).to_homogeneous()
            * Translation3::new(0.0, 0.0, self.orbit_radius).to_homogeneous()
    }

    /// Normalized face box as seen from the orbit (centered)
    #[must_use]
    pub fn face_box(&self) -> Rect {
        let size = ImageSize::new(self.width, self.height);
        let intrinsics = CameraIntrinsics::for_image(size);
        let depth = (self.orbit_radius - self.head_radius).max(f32::EPSILON);
        let half_w = (intrinsics.fx * self.head_radius / depth) / size.width;
        let half_h = (intrinsics.fy * self.head_radius / depth) / size.height;
        Rect::new(0.5 - half_w, 0.5 - half_h, 2.0 * half_w, 2.0 * half_h)
    }

    /// Build one frame
    #[must_use]
    pub fn frame(&self, index: usize) -> CameraFrame {
        let size = ImageSize::new(self.width, self.height);
        let blurred = self.blur_every > 0 && index % self.blur_every == self.blur_every - 1;

        #[allow(clippy::cast_precision_loss)]
        let timestamp = index as f64 / self.fps.max(1.0);

        CameraFrame {
            timestamp,
            image: PixelBuffer::Decoded(texture(self.width, self.height, index, blurred)),
            camera: FrameCamera {
                transform: self.pose(index),
                intrinsics: CameraIntrinsics::for_image(size),
            },
            raw_feature_points: Some(self.surface_points(index)),
            depth: None,
        }
    }

    /// Iterate over every frame of the sweep
    pub fn iter(&self) -> impl Iterator<Item = CameraFrame> + '_ {
        (0..self.frames).map(|i| self.frame(i))
    }

    #[allow(clippy::cast_precision_loss)]
    fn surface_points(&self, index: usize) -> Vec<Point> {
        let golden_angle = PI * (3.0 - 5.0f32.sqrt());
        (0..self.points_per_frame)
            .map(|k| {
                let idx = (index * self.points_per_frame + k) % SURFACE_POOL;
                let y = 1.0 - 2.0 * (idx as f32 + 0.5) / SURFACE_POOL as f32;
                let r = (1.0 - y * y).max(0.0).sqrt();
                let theta = golden_angle * idx as f32;
                Point::new(r * theta.cos(), y, r * theta.sin()) * self.head_radius
            })
            .collect()
    }
}

fn texture(width: u32, height: u32, index: usize, blurred: bool) -> RgbImage {
    if blurred {
        return RgbImage::from_pixel(width, height, Rgb([128, 110, 100]));
    }
    let shift = u32::try_from(index % 4).unwrap_or(0);
    RgbImage::from_fn(width, height, |x, y| {
        if ((x + shift) / 2 + y / 2) % 2 == 0 {
            Rgb([220, 190, 170])
        } else {
            Rgb([40, 30, 30])
        }
    })
}

/// Summary of a simulated scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Frames handed to the session
    pub frames_fed: usize,
    /// Frames that went through the pipeline
    pub frames_processed: usize,
    /// Frame index at which face-lock was first acquired
    pub lock_frame: Option<usize>,
    /// Stills accepted
    pub stills: usize,
    /// Final coverage fraction
    pub coverage: f32,
    /// Whether the session stopped itself
    pub auto_stopped: bool,
    /// Global points accumulated in the active bucket
    pub global_points: usize,
    /// Head-gated points accumulated in the active bucket
    pub head_points: usize,
    /// Final status line
    pub status: String,
}

/// Feed a sweep through a started session until it ends or the session stops
pub fn run(session: &mut ScanSession, sweep: &OrbitSweep) -> SimulationReport {
    let mut report = SimulationReport::default();

    for (index, frame) in sweep.iter().enumerate() {
        if !session.is_running() {
            break;
        }
        report.frames_fed += 1;
        let outcome = session.process_frame(&frame);
        if outcome.processed {
            report.frames_processed += 1;
        }
        if outcome.captured {
            report.stills += 1;
        }
        if report.lock_frame.is_none() && session.face_lock().is_locked() {
            report.lock_frame = Some(index);
        }
        if outcome.auto_stopped {
            report.auto_stopped = true;
        }
    }

    let bucket = session.bucket();
    report.coverage = session.coverage().coverage_fraction();
    report.global_points = session.points().global(bucket).len();
    report.head_points = session.points().head(bucket).len();
    report.status = session.status().to_string();
    log::info!(
        "Simulation: {} frames, {} stills, {:.0}% coverage",
        report.frames_fed,
        report.stills,
        report.coverage * 100.0
    );
    report
}
