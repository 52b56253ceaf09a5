use std::path::PathBuf;

use thiserror::Error;

/// Classification of a failure for the notification payload and operator
/// triage. Check failures are an expected class; everything else is either
/// a bad submission or a system problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    ResolveFailure,
    CheckFailure,
    HandlerHookError,
    SinkTransient,
    SinkPermanent,
    InvariantViolation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ResolveFailure => "resolve_failure",
            ErrorKind::CheckFailure => "check_failure",
            ErrorKind::HandlerHookError => "handler_hook_error",
            ErrorKind::SinkTransient => "sink_transient",
            ErrorKind::SinkPermanent => "sink_permanent",
            ErrorKind::InvariantViolation => "invariant_violation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid recipient '{value}': expected 'email:<address>' or a bare address")]
    InvalidRecipient { value: String },

    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Violations of the pipeline-file and collection rules. These indicate a
/// handler or runtime bug rather than a bad submission.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Duplicate file in collection: {local_path}")]
    DuplicateFile { local_path: PathBuf },

    #[error("Attribute '{attribute}' not set on '{file}'")]
    AttributeNotSet { attribute: &'static str, file: String },

    #[error("Attribute '{attribute}' is frozen on '{file}' (a completion flag is already set)")]
    AttributeFrozen { attribute: &'static str, file: String },

    #[error("Invalid publish type on '{file}': {reason}")]
    InvalidPublishType { file: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Input file '{path}' is not readable: {source}")]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file '{path}' is not a valid '{expected}' file")]
    InvalidFormat {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("Delete manifests are not accepted by this handler: {path}")]
    DeleteManifestNotAllowed { path: PathBuf },

    #[error("Failed to expand archive '{path}': {reason}")]
    ArchiveExpansion { path: PathBuf, reason: String },

    #[error("Archive entry '{entry}' escapes the extraction directory")]
    UnsafeArchiveEntry { entry: String },

    #[error("Manifest entry '{path}' does not exist or is not readable")]
    MissingManifestEntry { path: PathBuf },

    #[error("Failed to read manifest '{path}': {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to materialise '{path}' into scratch: {source}")]
    Materialise {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Collection(#[from] FileError),
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::UnreadableInput { .. }
            | ResolveError::InvalidFormat { .. }
            | ResolveError::DeleteManifestNotAllowed { .. } => ErrorKind::InvalidInput,
            ResolveError::Collection(_) => ErrorKind::InvariantViolation,
            _ => ErrorKind::ResolveFailure,
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Unknown check suite '{name}'")]
    UnknownSuite { name: String },

    #[error("Failed to read '{path}' during check: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The following files failed the check step: {}", names.join(", "))]
    FilesFailed { names: Vec<String> },
}

impl CheckError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckError::FilesFailed { .. } => ErrorKind::CheckFailure,
            CheckError::UnknownSuite { .. } => ErrorKind::InvariantViolation,
            CheckError::ReadFailure { .. } => ErrorKind::ResolveFailure,
        }
    }
}

/// Storage sink failures, split by whether a retry could plausibly succeed.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Transient storage failure during {operation} of '{target}': {source}")]
    Transient {
        operation: &'static str,
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage failure during {operation} of '{target}': {reason}")]
    Permanent {
        operation: &'static str,
        target: String,
        reason: String,
    },

    #[error("Unsupported storage URI scheme in '{uri}'")]
    UnsupportedScheme { uri: String },

    #[error("Invalid storage URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Remote path '{path}' must be relative and must not contain '..'")]
    InvalidRemotePath { path: String },
}

impl BrokerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transient { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        if self.is_transient() {
            ErrorKind::SinkTransient
        } else {
            ErrorKind::SinkPermanent
        }
    }
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("No matching harvester for: {}", files.join(", "))]
    NoMatchingHarvester { files: Vec<String> },

    #[error("Harvester '{name}' failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Harvester '{name}' does not support deletion; cannot roll back: {}", files.join(", "))]
    RollbackUnsupported { name: String, files: Vec<String> },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Archive failed for '{file}': {source}")]
    Archive {
        file: String,
        #[source]
        source: BrokerError,
    },

    #[error(transparent)]
    Harvest(#[from] HarvestError),

    #[error("Store failed for '{file}': {source}")]
    Store {
        file: String,
        #[source]
        source: BrokerError,
    },

    #[error(transparent)]
    File(#[from] FileError),
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            // Transient classification only drives the retry layer; by the
            // time an error escapes the publisher its retries are spent.
            PublishError::Archive { .. }
            | PublishError::Store { .. }
            | PublishError::Harvest(_) => ErrorKind::SinkPermanent,
            PublishError::File(_) => ErrorKind::InvariantViolation,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {reason}")]
    Send { reason: String },
}

/// Error raised from a handler-supplied phase hook.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Handler has already been executed")]
    AlreadyRun,

    #[error("Input file '{path}' is missing or unreadable: {source}")]
    InvalidInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create scratch directory '{path}': {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error("Hook '{phase}' failed: {source}")]
    Hook {
        phase: &'static str,
        #[source]
        source: HookError,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    File(#[from] FileError),
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::AlreadyRun => ErrorKind::InvariantViolation,
            HandlerError::InvalidInput { .. } => ErrorKind::InvalidInput,
            HandlerError::Scratch { .. } => ErrorKind::SinkPermanent,
            HandlerError::Resolve(e) => e.kind(),
            HandlerError::Check(e) => e.kind(),
            HandlerError::Hook { .. } => ErrorKind::HandlerHookError,
            HandlerError::Publish(e) => e.kind(),
            HandlerError::Broker(e) => e.kind(),
            HandlerError::File(_) => ErrorKind::InvariantViolation,
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("No handler registered under '{name}'")]
    UnknownHandler { name: String },
}

#[derive(Error, Debug)]
pub enum InflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Storage error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

pub type Result<T> = std::result::Result<T, InflowError>;
