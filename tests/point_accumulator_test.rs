//! Point accumulation, head gating and retention tests

use dental_face_scan::camera::{CameraIntrinsics, FrameCamera};
use dental_face_scan::face_lock::ReferenceFrame;
use dental_face_scan::geometry::{ImageSize, Point, Rect, Transform};
use dental_face_scan::point_accumulator::{AccumulatorSettings, PointAccumulator, PointBuffer};
use dental_face_scan::preview::PreviewGeometry;
use dental_face_scan::types::{CaptureBucket, PreviewMode};
use nalgebra::Translation3;

fn camera() -> FrameCamera {
    FrameCamera {
        transform: Transform::identity(),
        intrinsics: CameraIntrinsics::for_image(ImageSize::new(100, 100)),
    }
}

fn reference() -> ReferenceFrame {
    ReferenceFrame::new(Translation3::new(0.0, 0.0, 1.0).to_homogeneous()).unwrap()
}

#[allow(clippy::cast_precision_loss)]
fn numbered(count: usize) -> Vec<Point> {
    (0..count).map(|i| Point::new(i as f32, 0.0, -1.0)).collect()
}

#[test]
fn test_global_buffer_keeps_latest_points() {
    let mut acc = PointAccumulator::default();
    let size = ImageSize::new(100, 100);
    let reference = reference();
    for chunk in numbered(700_000).chunks(100_000) {
        acc.ingest(CaptureBucket::Repose, chunk, None, &camera(), size, Some(&reference));
    }
    let global = acc.global(CaptureBucket::Repose);
    assert_eq!(global.len(), 600_000);
    // Oldest 100k dropped
    assert!((global.points()[0].x - 100_000.0).abs() < 0.5);
    assert!((global.points()[599_999].x - 699_999.0).abs() < 0.5);
}

#[test]
fn test_single_oversized_ingest_keeps_suffix() {
    let mut acc = PointAccumulator::default();
    let size = ImageSize::new(100, 100);
    let reference = reference();
    acc.ingest(CaptureBucket::Repose, &numbered(700_000), None, &camera(), size, Some(&reference));

    let global = acc.global(CaptureBucket::Repose);
    assert_eq!(global.len(), 600_000);
    assert!((global.points()[0].x - 100_000.0).abs() < 0.5);
    assert!((global.points()[599_999].x - 699_999.0).abs() < 0.5);
}

#[test]
fn test_points_are_expressed_in_reference_space() {
    let mut acc = PointAccumulator::default();
    let reference = reference();
    acc.ingest(
        CaptureBucket::Smile,
        &[Point::new(0.0, 0.0, 0.0)],
        None,
        &camera(),
        ImageSize::new(100, 100),
        Some(&reference),
    );
    let p = acc.global(CaptureBucket::Smile).points()[0];
    assert!((p.z + 1.0).abs() < 1e-6);
}

#[test]
fn test_no_reference_discards_points() {
    let mut acc = PointAccumulator::default();
    let stats = acc.ingest(
        CaptureBucket::Repose,
        &numbered(10),
        Some(Rect::new(0.0, 0.0, 1.0, 1.0)),
        &camera(),
        ImageSize::new(100, 100),
        None,
    );
    assert_eq!(stats.global_added, 0);
    assert!(acc.global(CaptureBucket::Repose).is_empty());
}

#[test]
fn test_head_gate_skips_every_third_point() {
    let mut acc = PointAccumulator::default();
    let points = vec![Point::new(0.0, 0.0, -1.0); 9];
    let stats = acc.ingest(
        CaptureBucket::Profile,
        &points,
        Some(Rect::new(0.4, 0.4, 0.2, 0.2)),
        &camera(),
        ImageSize::new(100, 100),
        Some(&reference()),
    );
    assert_eq!(stats.global_added, 9);
    // Indices 0, 3 and 6 skipped
    assert_eq!(stats.head_added, 6);
}

#[test]
fn test_points_outside_head_are_not_gated() {
    let mut acc = PointAccumulator::default();
    let points = vec![Point::new(0.45, 0.45, -1.0); 4];
    let stats = acc.ingest(
        CaptureBucket::Repose,
        &points,
        Some(Rect::new(0.4, 0.4, 0.2, 0.2)),
        &camera(),
        ImageSize::new(100, 100),
        Some(&reference()),
    );
    assert_eq!(stats.head_added, 0);
    assert_eq!(stats.global_added, 4);
}

#[test]
fn test_buckets_are_independent() {
    let settings = AccumulatorSettings {
        global_cap: 10,
        ..AccumulatorSettings::default()
    };
    let mut acc = PointAccumulator::new(settings);
    let reference = reference();
    let size = ImageSize::new(100, 100);
    acc.ingest(CaptureBucket::Repose, &numbered(4), None, &camera(), size, Some(&reference));
    acc.ingest(CaptureBucket::Smile, &numbered(25), None, &camera(), size, Some(&reference));
    assert_eq!(acc.global(CaptureBucket::Repose).len(), 4);
    assert_eq!(acc.global(CaptureBucket::Smile).len(), 10);

    acc.clear(CaptureBucket::Smile);
    assert!(acc.global(CaptureBucket::Smile).is_empty());
    assert_eq!(acc.global(CaptureBucket::Repose).len(), 4);
}

#[test]
fn test_zero_cap_buffer_stays_empty() {
    let mut buffer = PointBuffer::new(0);
    buffer.extend(numbered(5));
    assert!(buffer.is_empty());
}

#[test]
fn test_sparse_preview_halves_points() {
    let points = numbered(10);
    let dense = PreviewGeometry::build(&points, PreviewMode::DenseMesh);
    let sparse = PreviewGeometry::build(&points, PreviewMode::SparseMesh);
    assert_eq!(dense.len(), 10);
    assert_eq!(sparse.len(), 5);
    let (min, max) = dense.bounds().unwrap();
    assert!((min.x - 0.0).abs() < f32::EPSILON);
    assert!((max.x - 9.0).abs() < f32::EPSILON);
}
