use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::error::ErrorKind;
use crate::files::FileCollection;

/// The states of one handler execution: the eight phases plus the initial
/// and terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Initialise,
    Resolve,
    Preprocess,
    Check,
    Process,
    Publish,
    Postprocess,
    Notify,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Initialise => "initialise",
            Phase::Resolve => "resolve",
            Phase::Preprocess => "preprocess",
            Phase::Check => "check",
            Phase::Process => "process",
            Phase::Publish => "publish",
            Phase::Postprocess => "postprocess",
            Phase::Notify => "notify",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one handler execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    CheckFailed,
    Failed,
    Cancelled,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Success => "success",
            Disposition::CheckFailed => "check_failed",
            Disposition::Failed => "failed",
            Disposition::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative cancellation signal, checked at phase boundaries. In-flight
/// I/O is never interrupted; the handler jumps to notify at the next
/// boundary after the signal is raised.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Per-instance scratch directory, created on initialise and removed on
/// handler teardown regardless of outcome.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(base: &Path, id: &str) -> std::io::Result<Self> {
        let path = base.join(format!("handler-{id}"));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
            }
        }
    }
}

/// A failure recorded against the phase it happened in.
#[derive(Debug, Clone)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub kind: ErrorKind,
    pub message: String,
}

/// The runtime's own record for one execution: input, phase cursor, the
/// file collection, scratch space, accumulated warnings and the recorded
/// failure, if any.
#[derive(Debug)]
pub struct HandlerContext {
    pub input_file: PathBuf,
    pub files: FileCollection,
    pub phase: Phase,
    pub failure: Option<PhaseFailure>,
    pub warnings: Vec<String>,
    scratch: Option<ScratchDir>,
}

impl HandlerContext {
    pub fn new(input_file: PathBuf) -> Self {
        Self {
            input_file,
            files: FileCollection::new(),
            phase: Phase::Created,
            failure: None,
            warnings: Vec::new(),
            scratch: None,
        }
    }

    pub fn attach_scratch(&mut self, scratch: ScratchDir) {
        self.scratch = Some(scratch);
    }

    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(ScratchDir::path)
    }

    /// Tear down the scratch directory and every local materialisation
    /// inside it.
    pub fn drop_scratch(&mut self) {
        self.scratch = None;
    }
}
