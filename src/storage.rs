//! Still image persistence per capture bucket.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<bucket>/img_<millis>.jpg      full-resolution still
//! <root>/<bucket>/img_<millis>.depth    optional raw f32 LE depth map
//! <root>/<bucket>/img_<millis>.json     optional capture metadata
//! <root>/<bucket>/PhotogrammetryInput/  re-indexed staging copy
//! ```

use crate::camera::{CameraIntrinsics, DepthMap};
use crate::constants::{
    PHOTOGRAMMETRY_INPUT_DIR, RECONSTRUCTION_OUTPUT_FILE, STAGED_JPEG_QUALITY, STILL_EXTENSIONS,
    STILL_JPEG_QUALITY,
};
use crate::error::Error;
use crate::geometry::{Rect, Transform};
use crate::quality::QualityScores;
use crate::types::CaptureBucket;
use crate::Result;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capture metadata written next to a still
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Frame timestamp in seconds
    pub timestamp: f64,
    /// Wall-clock capture time
    pub captured_at: DateTime<Utc>,
    /// Bucket the still belongs to
    pub bucket: CaptureBucket,
    /// Camera-to-world transform, column-major
    pub camera_transform: [[f32; 4]; 4],
    /// Camera intrinsics
    pub intrinsics: CameraIntrinsics,
    /// Quality scores at capture time
    pub scores: QualityScores,
    /// Normalized mouth region, if one was detected
    pub mouth_region: Option<Rect>,
}

impl CaptureMetadata {
    /// Metadata stamped with the current wall-clock time
    #[must_use]
    pub fn new(
        timestamp: f64,
        bucket: CaptureBucket,
        transform: &Transform,
        intrinsics: CameraIntrinsics,
        scores: QualityScores,
        mouth_region: Option<Rect>,
    ) -> Self {
        let mut camera_transform = [[0.0; 4]; 4];
        for (col, column) in camera_transform.iter_mut().enumerate() {
            for (row, value) in column.iter_mut().enumerate() {
                *value = transform[(row, col)];
            }
        }
        Self {
            timestamp,
            captured_at: Utc::now(),
            bucket,
            camera_transform,
            intrinsics,
            scores,
            mouth_region,
        }
    }

    /// Camera transform as a matrix
    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform::from_fn(|row, col| self.camera_transform[col][row])
    }
}

/// Destination for captured stills.
///
/// Writes are best-effort: failures are logged and reported as `None`, never
/// propagated into the frame loop.
pub trait StillStorage: Send + Sync {
    /// Persist a full-resolution still
    fn write(&self, image: &RgbImage, bucket: CaptureBucket) -> Option<PathBuf> {
        self.write_with_depth(image, None, None, bucket)
    }

    /// Persist a still with optional depth and metadata sidecars
    fn write_with_depth(
        &self,
        image: &RgbImage,
        depth: Option<&DepthMap>,
        metadata: Option<&CaptureMetadata>,
        bucket: CaptureBucket,
    ) -> Option<PathBuf>;

    /// Remove everything stored for a bucket
    fn clear(&self, bucket: CaptureBucket);

    /// Folder holding a bucket's stills
    fn folder(&self, bucket: CaptureBucket) -> PathBuf;

    /// Staging folder handed to the reconstruction engine
    fn photogrammetry_input_folder(&self, bucket: CaptureBucket) -> PathBuf {
        self.folder(bucket).join(PHOTOGRAMMETRY_INPUT_DIR)
    }

    /// Number of stills stored for a bucket
    fn count(&self, bucket: CaptureBucket) -> usize {
        list_stills(&self.folder(bucket)).map_or(0, |stills| stills.len())
    }
}

/// Filesystem still store
#[derive(Debug)]
pub struct ImageStore {
    root: PathBuf,
    jpeg_quality: u8,
    last_stamp: AtomicI64,
}

impl ImageStore {
    /// Store rooted at `root` (created lazily)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_quality(root, STILL_JPEG_QUALITY)
    }

    /// Store with a custom JPEG quality (1–100)
    #[must_use]
    pub fn with_quality(root: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            root: root.into(),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Storage root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh still path in a bucket.
    ///
    /// Names use wall-clock milliseconds, bumped so that they strictly
    /// increase within this store.
    ///
    /// # Errors
    /// * Returns error if the bucket folder cannot be created
    pub fn next_still_path(&self, bucket: CaptureBucket) -> Result<PathBuf> {
        let folder = self.folder(bucket);
        fs::create_dir_all(&folder)?;

        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        let stamp = loop {
            let candidate = now.max(prev + 1);
            match self
                .last_stamp
                .compare_exchange_weak(prev, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break candidate,
                Err(actual) => prev = actual,
            }
        };

        Ok(folder.join(format!("img_{stamp}.jpg")))
    }

    /// Write a still and its sidecars at a reserved path
    ///
    /// # Errors
    /// * Returns error if encoding or any file write fails
    pub fn write_at(
        &self,
        path: &Path,
        image: &RgbImage,
        depth: Option<&DepthMap>,
        metadata: Option<&CaptureMetadata>,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_jpeg(path, image, self.jpeg_quality)?;

        if let Some(depth) = depth {
            write_atomic(&path.with_extension("depth"), &depth.to_le_bytes())?;
        }
        if let Some(metadata) = metadata {
            let json = serde_json::to_vec_pretty(metadata)?;
            write_atomic(&path.with_extension("json"), &json)?;
        }
        Ok(())
    }

    /// Remove a bucket's contents, propagating failures
    ///
    /// # Errors
    /// * Returns error if the folder cannot be read or an entry cannot be removed
    pub fn try_clear(&self, bucket: CaptureBucket) -> Result<()> {
        let folder = self.folder(bucket);
        if !folder.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&folder)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

impl StillStorage for ImageStore {
    fn write_with_depth(
        &self,
        image: &RgbImage,
        depth: Option<&DepthMap>,
        metadata: Option<&CaptureMetadata>,
        bucket: CaptureBucket,
    ) -> Option<PathBuf> {
        let result = self
            .next_still_path(bucket)
            .and_then(|path| self.write_at(&path, image, depth, metadata).map(|()| path));
        match result {
            Ok(path) => {
                log::debug!("Wrote still {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("Failed to write still for {}: {}", bucket, e);
                None
            }
        }
    }

    fn clear(&self, bucket: CaptureBucket) {
        if let Err(e) = self.try_clear(bucket) {
            log::warn!("Failed to clear {} folder: {}", bucket, e);
        }
    }

    fn folder(&self, bucket: CaptureBucket) -> PathBuf {
        self.root.join(bucket.as_str())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = BufWriter::new(File::create(&tmp)?);
        file.write_all(bytes)?;
        file.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_jpeg(path: &Path, image: &RgbImage, quality: u8) -> Result<()> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(image)?;
    write_atomic(path, &bytes)
}

fn is_still(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        && !path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'))
}

/// Chronological key: the millisecond stamp in `img_<millis>` names, else the
/// file modification time
fn chronological_key(path: &Path) -> i64 {
    let from_name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("img_"))
        .and_then(|stamp| stamp.parse::<i64>().ok());

    from_name.unwrap_or_else(|| {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
            .unwrap_or(i64::MIN)
    })
}

/// Stills directly inside `folder`, oldest first
///
/// # Errors
/// * Returns error if the folder cannot be read
pub fn list_stills(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.exists() {
        return Ok(Vec::new());
    }
    let mut stills = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if is_still(&path) {
            stills.push(path);
        }
    }
    stills.sort_by(|a, b| {
        chronological_key(a)
            .cmp(&chronological_key(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
    Ok(stills)
}

/// Pick at most `max_samples` items with a uniform stride, keeping order
#[must_use]
pub fn stride_sample<T: Clone>(items: &[T], max_samples: usize) -> Vec<T> {
    if items.len() <= max_samples {
        return items.to_vec();
    }
    let step = (items.len() / max_samples.max(1)).max(1);
    items
        .iter()
        .step_by(step)
        .take(max_samples)
        .cloned()
        .collect()
}

/// Result of staging stills for reconstruction
#[derive(Debug, Clone, PartialEq)]
pub struct StagedInput {
    /// Staging folder
    pub folder: PathBuf,
    /// Re-encoded images, in order
    pub images: Vec<PathBuf>,
    /// Where the engine should write its model
    pub output: PathBuf,
}

/// Copy a bucket's stills into a fresh staging folder.
///
/// Stills are sorted chronologically, stride-sampled to `max_samples`,
/// re-encoded as JPEG and renamed `img_0000.jpg`, `img_0001.jpg`, …
/// Unreadable stills are skipped.
///
/// # Errors
/// * Returns `InsufficientImages` if fewer than `min_images` were staged
/// * Returns error if the staging folder cannot be prepared
pub fn stage_photogrammetry_input(
    storage: &dyn StillStorage,
    bucket: CaptureBucket,
    max_samples: usize,
    min_images: usize,
) -> Result<StagedInput> {
    let stills = list_stills(&storage.folder(bucket))?;
    if stills.is_empty() {
        return Err(Error::InsufficientImages {
            found: 0,
            required: min_images,
        });
    }
    let sampled = stride_sample(&stills, max_samples);

    let folder = storage.photogrammetry_input_folder(bucket);
    if folder.exists() {
        fs::remove_dir_all(&folder)?;
    }
    fs::create_dir_all(&folder)?;

    let mut images = Vec::with_capacity(sampled.len());
    for src in &sampled {
        let decoded = match image::open(src) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                log::warn!("Skipping unreadable still {}: {}", src.display(), e);
                continue;
            }
        };
        let dst = folder.join(format!("img_{:04}.jpg", images.len()));
        if let Err(e) = write_jpeg(&dst, &decoded, STAGED_JPEG_QUALITY) {
            log::warn!("Failed to stage {}: {}", src.display(), e);
            continue;
        }
        images.push(dst);
    }

    if images.len() < min_images {
        return Err(Error::InsufficientImages {
            found: images.len(),
            required: min_images,
        });
    }

    let output = folder.join(RECONSTRUCTION_OUTPUT_FILE);
    if output.exists() {
        fs::remove_file(&output)?;
    }

    log::info!("Staged {} of {} stills for {}", images.len(), stills.len(), bucket);
    Ok(StagedInput { folder, images, output })
}

enum WriteJob {
    Still {
        path: PathBuf,
        image: RgbImage,
        depth: Option<DepthMap>,
        metadata: Option<CaptureMetadata>,
    },
    Clear(CaptureBucket),
}

impl WriteJob {
    fn run(self, store: &ImageStore) -> bool {
        match self {
            WriteJob::Still {
                path,
                image,
                depth,
                metadata,
            } => match store.write_at(&path, &image, depth.as_ref(), metadata.as_ref()) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Background write of {} failed: {}", path.display(), e);
                    false
                }
            },
            WriteJob::Clear(bucket) => {
                store.clear(bucket);
                false
            }
        }
    }
}

/// Still storage that encodes and writes on a background task.
///
/// Paths are reserved synchronously so callers get them immediately; jobs,
/// including clears, are executed in submission order.
pub struct BackgroundWriter {
    store: Arc<ImageStore>,
    tx: mpsc::UnboundedSender<WriteJob>,
    worker: JoinHandle<usize>,
}

impl BackgroundWriter {
    /// Start the writer task on the current tokio runtime
    ///
    /// # Errors
    /// * Returns error if called outside a tokio runtime
    pub fn spawn(store: Arc<ImageStore>) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Storage(format!("Background writer needs a tokio runtime: {e}")))?;
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();

        let worker_store = Arc::clone(&store);
        let worker = runtime.spawn(async move {
            let mut written = 0usize;
            while let Some(job) = rx.recv().await {
                let store = Arc::clone(&worker_store);
                match tokio::task::spawn_blocking(move || job.run(&store)).await {
                    Ok(true) => written += 1,
                    Ok(false) => {}
                    Err(e) => log::warn!("Background write task failed: {}", e),
                }
            }
            written
        });

        Ok(Self { store, tx, worker })
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Stop accepting jobs, drain the queue and return the number of stills written
    ///
    /// # Errors
    /// * Returns error if the worker task panicked
    pub async fn finish(self) -> Result<usize> {
        drop(self.tx);
        self.worker
            .await
            .map_err(|e| Error::Storage(format!("Background writer failed: {e}")))
    }
}

impl StillStorage for BackgroundWriter {
    fn write_with_depth(
        &self,
        image: &RgbImage,
        depth: Option<&DepthMap>,
        metadata: Option<&CaptureMetadata>,
        bucket: CaptureBucket,
    ) -> Option<PathBuf> {
        let path = match self.store.next_still_path(bucket) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Failed to reserve still path for {}: {}", bucket, e);
                return None;
            }
        };
        let job = WriteJob::Still {
            path: path.clone(),
            image: image.clone(),
            depth: depth.cloned(),
            metadata: metadata.cloned(),
        };
        if self.tx.send(job).is_err() {
            log::warn!("Background writer is closed; dropping still");
            return None;
        }
        Some(path)
    }

    fn clear(&self, bucket: CaptureBucket) {
        if self.tx.send(WriteJob::Clear(bucket)).is_err() {
            self.store.clear(bucket);
        }
    }

    fn folder(&self, bucket: CaptureBucket) -> PathBuf {
        self.store.folder(bucket)
    }
}
