use std::fs::{self, File};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::archiver::{Archiver, CompressionLevel, PackJob, PackSummary, ProgressFn};
use crate::error::Error;
use crate::request::ArchiveRequest;

/// Terminal result of one [`ArchiveTask::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(PackSummary),
    /// Nothing was packed: the task was busy, the source was missing or the
    /// destination file could not be created.
    SetupFailure(String),
    /// The archiver failed after the destination file was created.
    PackFailure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The message shown to the user for this outcome.
    pub fn message(&self) -> &str {
        match self {
            Self::Success(_) => "Successfully created cabinet!",
            Self::SetupFailure(message) => message,
            Self::PackFailure(_) => "Oops something went wrong!",
        }
    }
}

/// Observable lifecycle of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    FileCreated,
    Packing,
    Succeeded,
    Failed,
}

/// Knobs that apply to every run of a task.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    pub compression: CompressionLevel,
    pub skip: Vec<String>,
    /// Delete the destination when packing fails instead of leaving it behind.
    pub remove_partial: bool,
}

/// Holds the in-flight flag for as long as a run is active.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs archive-creation operations one at a time.
///
/// Clones share the in-flight flag, state channel and cancellation token, so
/// a clone can observe or cancel a run started from another. Cancellation is
/// permanent: once the token fires, later runs fail with `Cancelled` too.
pub struct ArchiveTask<A> {
    archiver: Arc<A>,
    options: Arc<TaskOptions>,
    progress: Option<ProgressFn>,
    busy: Arc<AtomicBool>,
    state: Arc<watch::Sender<TaskState>>,
    cancel: CancellationToken,
}

impl<A> Clone for ArchiveTask<A> {
    fn clone(&self) -> Self {
        Self {
            archiver: Arc::clone(&self.archiver),
            options: Arc::clone(&self.options),
            progress: self.progress.clone(),
            busy: Arc::clone(&self.busy),
            state: Arc::clone(&self.state),
            cancel: self.cancel.clone(),
        }
    }
}

impl<A: Archiver> ArchiveTask<A> {
    pub fn new(archiver: A, options: TaskOptions) -> Self {
        let (state, _) = watch::channel(TaskState::Idle);
        Self {
            archiver: Arc::new(archiver),
            options: Arc::new(options),
            progress: None,
            busy: Arc::new(AtomicBool::new(false)),
            state: Arc::new(state),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.subscribe()
    }

    /// Token that aborts the pack step of the current run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Puts a finished task back to `Idle`. Ignored while a run is active.
    pub fn reset(&self) {
        if let Some(_guard) = BusyGuard::acquire(&self.busy) {
            self.state.send_replace(TaskState::Idle);
        }
    }

    /// Performs one archive operation and reports its outcome.
    ///
    /// The destination file is created before any background work starts; the
    /// pack step runs on the blocking pool. The busy flag is cleared before
    /// this returns.
    pub async fn run(&self, request: ArchiveRequest) -> Outcome {
        let Some(guard) = BusyGuard::acquire(&self.busy) else {
            warn!("Rejected archive request while another is in flight");
            return Outcome::SetupFailure(Error::Busy.to_string());
        };

        let outcome = self.run_exclusive(request).await;

        // Publish while still holding the slot so a newer run's state wins.
        let terminal = if outcome.is_success() {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        self.state.send_replace(terminal);
        drop(guard);
        outcome
    }

    async fn run_exclusive(&self, request: ArchiveRequest) -> Outcome {
        let destination = request.destination_path();

        if !request.source_path().is_dir() {
            let err = Error::SourceNotDirectory(request.source_path().to_path_buf());
            warn!(error = %err, "Archive setup failed");
            return Outcome::SetupFailure(err.to_string());
        }

        // Create the file, or truncate it if it exists.
        if let Err(source) = File::create(&destination) {
            let err = Error::CreateDestination {
                path: destination,
                source,
            };
            warn!(error = %err, "Archive setup failed");
            return Outcome::SetupFailure(err.to_string());
        }
        self.state.send_replace(TaskState::FileCreated);

        let job = PackJob {
            source_dir: request.source_path().to_path_buf(),
            destination: destination.clone(),
            recursive: request.include_subfolders(),
            compression: self.options.compression,
            skip: self.options.skip.clone(),
            cancel: self.cancel.child_token(),
        };

        info!(
            source = %job.source_dir.display(),
            destination = %destination.display(),
            recursive = job.recursive,
            "Starting archive task"
        );
        self.state.send_replace(TaskState::Packing);

        let archiver = Arc::clone(&self.archiver);
        let progress = self.progress.clone();
        let joined =
            tokio::task::spawn_blocking(move || archiver.pack(&job, progress.as_ref())).await;

        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(Error::Worker(e.to_string())),
        };

        match result {
            Ok(summary) => {
                info!(files = summary.files, bytes = summary.total_bytes, "Cabinet created");
                Outcome::Success(summary)
            }
            Err(err) => {
                warn!(error = %err, "Packing failed");
                if self.options.remove_partial {
                    if let Err(e) = fs::remove_file(&destination) {
                        warn!(error = %e, path = %destination.display(), "Could not remove partial archive");
                    }
                }
                Outcome::PackFailure(err.to_string())
            }
        }
    }
}
