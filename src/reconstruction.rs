//! High-detail reconstruction jobs.
//!
//! A job stages the active bucket's stills, then runs a blocking
//! [`ReconstructionEngine`] on the tokio blocking pool. Progress and the
//! terminal outcome flow back over an mpsc channel; a [`CancellationToken`]
//! asks the engine to stop. At most one engine runs per controller: a
//! cancelled job keeps blocking [`ReconstructionController::start`] until its
//! engine has returned.

use crate::constants::{DEFAULT_MAX_RECONSTRUCTION_SAMPLES, DEFAULT_MIN_RECONSTRUCTION_IMAGES};
use crate::error::Error;
use crate::storage::{stage_photogrammetry_input, StillStorage};
use crate::types::CaptureBucket;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Input handed to a reconstruction engine
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionRequest {
    /// Bucket being reconstructed
    pub bucket: CaptureBucket,
    /// Staging folder with re-indexed images
    pub input_folder: PathBuf,
    /// Staged images, in order
    pub images: Vec<PathBuf>,
    /// Where the model file must be written
    pub output: PathBuf,
}

/// Message emitted by a running job
#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructionEvent {
    /// Fraction done in `[0, 1]`
    Progress(f32),
    /// Model written to the given path
    Completed(PathBuf),
    /// Engine failed; message is human-readable
    Failed(String),
    /// Job stopped on request
    Cancelled,
}

impl ReconstructionEvent {
    /// Whether no further events follow this one
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReconstructionEvent::Progress(_))
    }
}

/// Progress reporter handed to engines
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<ReconstructionEvent>,
}

impl ProgressSink {
    /// Report a fraction in `[0, 1]` (clamped)
    pub fn report(&self, fraction: f32) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        // The controller may have gone away; progress is advisory
        let _ = self.tx.send(ReconstructionEvent::Progress(fraction));
    }
}

/// Photogrammetry engine.
///
/// `reconstruct` blocks until the model is written; it should check `cancel`
/// regularly and return [`Error::Cancelled`] once it is set.
pub trait ReconstructionEngine: Send + Sync + 'static {
    /// Build a model from the staged images
    ///
    /// # Errors
    /// * Returns error if processing fails or is cancelled
    fn reconstruct(
        &self,
        request: &ReconstructionRequest,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

/// Engine that runs an external photogrammetry command.
///
/// The command receives the staging folder and the output path as its last
/// two arguments. It is killed when the job is cancelled.
#[derive(Debug, Clone)]
pub struct ExternalCommandEngine {
    program: PathBuf,
    args: Vec<String>,
    poll_interval: Duration,
}

impl ExternalCommandEngine {
    /// Engine running `program` with leading `args`
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ReconstructionEngine for ExternalCommandEngine {
    fn reconstruct(
        &self,
        request: &ReconstructionRequest,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        log::info!(
            "Running {} on {} images",
            self.program.display(),
            request.images.len()
        );
        progress.report(0.0);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&request.input_folder)
            .arg(&request.output)
            .spawn()?;

        let status = loop {
            if cancel.is_cancelled() {
                if let Err(e) = child.kill() {
                    log::warn!("Failed to kill reconstruction command: {}", e);
                }
                let _ = child.wait();
                return Err(Error::Cancelled);
            }
            if let Some(status) = child.try_wait()? {
                break status;
            }
            std::thread::sleep(self.poll_interval);
        };

        if !status.success() {
            return Err(Error::Reconstruction(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }
        progress.report(1.0);
        Ok(request.output.clone())
    }
}

/// Staging limits for a reconstruction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionSettings {
    /// Maximum number of stills staged
    pub max_samples: usize,
    /// Minimum number of stills required
    pub min_images: usize,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_RECONSTRUCTION_SAMPLES,
            min_images: DEFAULT_MIN_RECONSTRUCTION_IMAGES,
        }
    }
}

/// Controller-side state of the reconstruction workflow
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReconstructionStatus {
    /// Nothing running
    #[default]
    Idle,
    /// Job running, with the last reported progress
    Running(f32),
    /// Model available
    Completed(PathBuf),
    /// Last attempt failed
    Failed(String),
    /// Last attempt was cancelled
    Cancelled,
}

/// Files removed when a job is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelCleanup {
    /// Leave everything on disk
    #[default]
    Keep,
    /// Remove the staging folder so a rerun starts fresh; stills survive
    StagedInput,
    /// Remove the bucket's stills together with the staging folder
    Captures,
}

struct ActiveJob {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<ReconstructionEvent>,
}

/// Drives one reconstruction job at a time
pub struct ReconstructionController {
    engine: Arc<dyn ReconstructionEngine>,
    settings: ReconstructionSettings,
    job: Option<ActiveJob>,
    draining: Option<JoinHandle<()>>,
    status: ReconstructionStatus,
    status_text: String,
    model: Option<PathBuf>,
}

impl ReconstructionController {
    /// Controller using `engine`
    #[must_use]
    pub fn new(engine: Arc<dyn ReconstructionEngine>, settings: ReconstructionSettings) -> Self {
        Self {
            engine,
            settings,
            job: None,
            draining: None,
            status: ReconstructionStatus::Idle,
            status_text: String::new(),
            model: None,
        }
    }

    /// Stage a bucket's stills and start a job on the current tokio runtime.
    ///
    /// # Errors
    /// * Returns `JobInProgress` if a job is running or a cancelled engine
    ///   has not returned yet
    /// * Returns `InsufficientImages` if too few stills could be staged
    /// * Returns error if staging fails or no runtime is available
    pub fn start(&mut self, storage: &dyn StillStorage, bucket: CaptureBucket) -> Result<()> {
        if self.job.is_some() || self.is_draining() {
            return Err(Error::JobInProgress);
        }
        self.draining = None;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Reconstruction(format!("No async runtime: {e}")))?;

        let staged = match stage_photogrammetry_input(
            storage,
            bucket,
            self.settings.max_samples,
            self.settings.min_images,
        ) {
            Ok(staged) => staged,
            Err(e) => {
                let text = match &e {
                    Error::InsufficientImages { found: 0, .. } => "No photos found – capture first.".to_string(),
                    Error::InsufficientImages { .. } => "Not enough valid photos for reconstruction.".to_string(),
                    other => format!("Cannot prepare input folder: {other}"),
                };
                self.set_status(ReconstructionStatus::Failed(text.clone()), text);
                return Err(e);
            }
        };

        let request = ReconstructionRequest {
            bucket,
            input_folder: staged.folder,
            images: staged.images,
            output: staged.output,
        };
        let count = request.images.len();

        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_job(Arc::clone(&self.engine), request, tx, cancel.clone()));

        self.job = Some(ActiveJob { handle, cancel, events });
        self.model = None;
        self.set_status(
            ReconstructionStatus::Running(0.0),
            format!("Photogrammetry: {count} images – starting…"),
        );
        Ok(())
    }

    /// Apply every event already received, without waiting
    pub fn poll(&mut self) -> Vec<ReconstructionEvent> {
        let mut received = Vec::new();
        loop {
            let Some(job) = self.job.as_mut() else { break };
            let Ok(event) = job.events.try_recv() else { break };
            self.apply(&event);
            received.push(event);
        }
        received
    }

    /// Wait for the next event and apply it; `None` when no job is running
    pub async fn next_event(&mut self) -> Option<ReconstructionEvent> {
        let job = self.job.as_mut()?;
        let event = match job.events.recv().await {
            Some(event) => event,
            None => ReconstructionEvent::Failed("Reconstruction task ended unexpectedly".to_string()),
        };
        self.apply(&event);
        Some(event)
    }

    /// Wait until the running job ends and return the resulting status
    pub async fn wait(&mut self) -> ReconstructionStatus {
        while self.next_event().await.is_some() {}
        self.status.clone()
    }

    /// Cancel the running job, if any, and return to idle.
    ///
    /// The engine is asked to stop; until it returns, `start` keeps failing
    /// with `JobInProgress` (see [`Self::settle`]).
    pub fn cancel(&mut self, storage: &dyn StillStorage, bucket: CaptureBucket, cleanup: CancelCleanup) {
        if let Some(job) = self.job.take() {
            job.cancel.cancel();
            // Pending events are dropped with the receiver
            self.draining = Some(job.handle);
        }
        self.model = None;
        self.set_status(ReconstructionStatus::Idle, "Photogrammetry cancelled".to_string());

        match cleanup {
            CancelCleanup::Keep => {}
            CancelCleanup::StagedInput => remove_staged_input(storage, bucket),
            CancelCleanup::Captures => {
                storage.clear(bucket);
                remove_staged_input(storage, bucket);
            }
        }
    }

    /// Wait for a cancelled engine to return
    pub async fn settle(&mut self) {
        if let Some(handle) = self.draining.take() {
            if let Err(e) = handle.await {
                log::warn!("Cancelled reconstruction task ended abnormally: {}", e);
            }
        }
    }

    /// Remove the current model file and the bucket's stills
    pub fn delete_model(&mut self, storage: &dyn StillStorage, bucket: CaptureBucket) {
        if let Some(model) = self.model.take() {
            if let Err(e) = std::fs::remove_file(&model) {
                log::warn!("Failed to delete {}: {}", model.display(), e);
            }
        }
        storage.clear(bucket);
        self.set_status(ReconstructionStatus::Idle, "Mesh deleted".to_string());
    }

    /// Whether a job is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.job.is_some()
    }

    /// Whether a cancelled engine is still winding down
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> &ReconstructionStatus {
        &self.status
    }

    /// Human-readable status line
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Model produced by the last successful job
    #[must_use]
    pub fn model_path(&self) -> Option<&Path> {
        self.model.as_deref()
    }

    fn apply(&mut self, event: &ReconstructionEvent) {
        match event {
            ReconstructionEvent::Progress(fraction) => {
                #[allow(clippy::cast_possible_truncation)]
                let pct = (fraction * 100.0) as i32;
                self.set_status(ReconstructionStatus::Running(*fraction), format!("Photogrammetry {pct}%"));
            }
            ReconstructionEvent::Completed(path) => {
                self.job = None;
                self.model = Some(path.clone());
                self.set_status(
                    ReconstructionStatus::Completed(path.clone()),
                    "High-detail mesh ready".to_string(),
                );
            }
            ReconstructionEvent::Failed(message) => {
                self.job = None;
                self.set_status(
                    ReconstructionStatus::Failed(message.clone()),
                    format!("Photogrammetry failed: {message}"),
                );
            }
            ReconstructionEvent::Cancelled => {
                self.job = None;
                self.set_status(ReconstructionStatus::Cancelled, "Photogrammetry cancelled".to_string());
            }
        }
    }

    fn set_status(&mut self, status: ReconstructionStatus, text: String) {
        if !matches!(status, ReconstructionStatus::Running(_)) {
            log::info!("{}", text);
        }
        self.status = status;
        self.status_text = text;
    }
}

impl Drop for ReconstructionController {
    fn drop(&mut self) {
        if let Some(job) = &self.job {
            job.cancel.cancel();
        }
    }
}

fn remove_staged_input(storage: &dyn StillStorage, bucket: CaptureBucket) {
    let folder = storage.photogrammetry_input_folder(bucket);
    if folder.exists() {
        if let Err(e) = std::fs::remove_dir_all(&folder) {
            log::warn!("Failed to remove {}: {}", folder.display(), e);
        }
    }
}

async fn run_job(
    engine: Arc<dyn ReconstructionEngine>,
    request: ReconstructionRequest,
    tx: mpsc::UnboundedSender<ReconstructionEvent>,
    cancel: CancellationToken,
) {
    let sink = ProgressSink { tx: tx.clone() };
    let token = cancel.clone();
    let result =
        tokio::task::spawn_blocking(move || engine.reconstruct(&request, &sink, &token)).await;

    let event = match result {
        _ if cancel.is_cancelled() => ReconstructionEvent::Cancelled,
        Ok(Ok(path)) if path.exists() => ReconstructionEvent::Completed(path),
        Ok(Ok(path)) => ReconstructionEvent::Failed(format!(
            "Photogrammetry OK, failed to load model at {}",
            path.display()
        )),
        Ok(Err(Error::Cancelled)) => ReconstructionEvent::Cancelled,
        Ok(Err(e)) => ReconstructionEvent::Failed(e.to_string()),
        Err(e) => ReconstructionEvent::Failed(format!("Reconstruction task failed: {e}")),
    };
    let _ = tx.send(event);
}
