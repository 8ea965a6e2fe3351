//! Still storage and photogrammetry staging tests

mod test_helpers;

use dental_face_scan::camera::{CameraIntrinsics, DepthMap};
use dental_face_scan::geometry::{ImageSize, Rect};
use dental_face_scan::quality::QualityScores;
use dental_face_scan::storage::{
    list_stills, stage_photogrammetry_input, BackgroundWriter, CaptureMetadata, ImageStore,
    StillStorage,
};
use dental_face_scan::types::CaptureBucket;
use dental_face_scan::Error;
use image::RgbImage;
use nalgebra::Translation3;
use std::fs;
use std::sync::Arc;
use test_helpers::seed_stills;

#[test]
fn test_still_names_strictly_increase() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    let paths = seed_stills(&store, CaptureBucket::Smile, 25);
    assert_eq!(list_stills(&store.folder(CaptureBucket::Smile)).unwrap(), paths);
    assert!(paths
        .iter()
        .all(|p| p.file_name().unwrap().to_str().unwrap().starts_with("img_")));
}

#[test]
fn test_sidecars_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    let transform = Translation3::new(0.25, -0.5, 1.0).to_homogeneous();
    let metadata = CaptureMetadata::new(
        4.5,
        CaptureBucket::Profile,
        &transform,
        CameraIntrinsics::for_image(ImageSize::new(16, 8)),
        QualityScores {
            quality: 0.8,
            mouth_quality: 0.7,
        },
        Some(Rect::new(0.4, 0.6, 0.2, 0.1)),
    );
    let depth = DepthMap {
        width: 2,
        height: 2,
        values: vec![0.5, 0.6, 0.7, 0.8],
    };

    let path = store
        .write_with_depth(&RgbImage::new(16, 8), Some(&depth), Some(&metadata), CaptureBucket::Profile)
        .unwrap();

    assert_eq!(fs::read(path.with_extension("depth")).unwrap().len(), 16);
    let parsed: CaptureMetadata = serde_json::from_slice(&fs::read(path.with_extension("json")).unwrap()).unwrap();
    assert_eq!(parsed.bucket, CaptureBucket::Profile);
    assert_eq!(parsed.transform(), transform);
    assert_eq!(parsed.mouth_region, metadata.mouth_region);
}

#[test]
fn test_listing_skips_hidden_and_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    let stills = seed_stills(&store, CaptureBucket::Repose, 2);
    let folder = store.folder(CaptureBucket::Repose);
    fs::write(folder.join(".img_1.jpg"), b"hidden").unwrap();
    fs::write(folder.join("notes.txt"), b"text").unwrap();
    assert_eq!(list_stills(&folder).unwrap(), stills);
}

#[test]
fn test_staging_renames_and_samples() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    seed_stills(&store, CaptureBucket::Repose, 30);

    let staged = stage_photogrammetry_input(&store, CaptureBucket::Repose, 10, 5).unwrap();
    assert_eq!(staged.folder, store.photogrammetry_input_folder(CaptureBucket::Repose));
    assert_eq!(staged.images.len(), 10);
    assert_eq!(staged.images[0].file_name().unwrap(), "img_0000.jpg");
    assert_eq!(staged.images[9].file_name().unwrap(), "img_0009.jpg");
    assert_eq!(staged.output.file_name().unwrap(), "face_high_detail.usdz");
    // The staging folder does not count as stills of the bucket
    assert_eq!(store.count(CaptureBucket::Repose), 30);

    // Restaging replaces the previous input
    let staged = stage_photogrammetry_input(&store, CaptureBucket::Repose, 4, 1).unwrap();
    assert_eq!(list_stills(&staged.folder).unwrap().len(), 4);
}

#[test]
fn test_staging_reports_missing_and_insufficient_stills() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    match stage_photogrammetry_input(&store, CaptureBucket::Smile, 140, 20) {
        Err(Error::InsufficientImages { found: 0, required: 20 }) => {}
        other => panic!("unexpected result {other:?}"),
    }

    seed_stills(&store, CaptureBucket::Smile, 5);
    fs::write(store.folder(CaptureBucket::Smile).join("img_99999999999999.jpg"), b"not a jpeg").unwrap();
    match stage_photogrammetry_input(&store, CaptureBucket::Smile, 140, 6) {
        Err(Error::InsufficientImages { found: 5, required: 6 }) => {}
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn test_background_writer_preserves_job_order() {
    let dir = tempfile::tempdir().unwrap();
    let writer = BackgroundWriter::spawn(Arc::new(ImageStore::new(dir.path()))).unwrap();

    let first = writer.write(&RgbImage::new(8, 8), CaptureBucket::Repose).unwrap();
    writer.clear(CaptureBucket::Repose);
    let second = writer.write(&RgbImage::new(8, 8), CaptureBucket::Repose).unwrap();
    assert!(second > first);

    let folder = writer.folder(CaptureBucket::Repose);
    assert_eq!(writer.finish().await.unwrap(), 2);
    assert_eq!(list_stills(&folder).unwrap(), vec![second]);
}

#[test]
fn test_background_writer_needs_runtime() {
    let dir = tempfile::tempdir().unwrap();
    assert!(BackgroundWriter::spawn(Arc::new(ImageStore::new(dir.path()))).is_err());
}
