pub mod local;

use std::path::{Component, Path};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::BrokerError;

pub use local::LocalBroker;

/// A file as seen by a storage backend query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Path relative to the broker prefix.
    pub dest_path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Uniform interface over the publication and archive sinks. Remote paths
/// are always relative to the broker's base URI.
pub trait StorageBroker: Send + Sync {
    /// Upload the local file to the remote path, overwriting any previous
    /// content and creating intermediate directories as required.
    fn put(&self, local: &Path, remote: &str) -> Result<(), BrokerError>;

    /// Remove the remote path. Removing a path that does not exist is not
    /// an error (`rm -f` semantics).
    fn delete(&self, remote: &str) -> Result<(), BrokerError>;

    fn exists(&self, remote: &str) -> Result<bool, BrokerError>;

    /// List remote files whose path starts with the given prefix, sorted by
    /// path.
    fn query(&self, prefix: &str) -> Result<Vec<RemoteFile>, BrokerError>;
}

impl std::fmt::Debug for dyn StorageBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn StorageBroker")
    }
}

/// Select a storage backend by URI scheme. Only `file://` is implemented
/// in-tree; object-store and WebDAV drivers are external collaborators and
/// their schemes are rejected here with a descriptive error.
pub fn broker_for_uri(uri: &str) -> Result<Box<dyn StorageBroker>, BrokerError> {
    let (scheme, rest) = uri.split_once("://").ok_or_else(|| BrokerError::InvalidUri {
        uri: uri.to_string(),
        reason: "missing scheme".to_string(),
    })?;

    match scheme {
        "file" => {
            if !rest.starts_with('/') {
                return Err(BrokerError::InvalidUri {
                    uri: uri.to_string(),
                    reason: "file URI must be an absolute path".to_string(),
                });
            }
            Ok(Box::new(LocalBroker::new(rest)))
        }
        _ => Err(BrokerError::UnsupportedScheme {
            uri: uri.to_string(),
        }),
    }
}

/// Reject absolute remote paths and parent-directory traversal before they
/// reach a backend.
pub fn validate_remote_path(remote: &str) -> Result<(), BrokerError> {
    let path = Path::new(remote);
    let unsafe_path = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir));
    if unsafe_path {
        return Err(BrokerError::InvalidRemotePath {
            path: remote.to_string(),
        });
    }
    Ok(())
}

/// Bounded exponential backoff applied to transient sink failures at the
/// client layer. Once the attempts are exhausted the last error is
/// reported as-is and the publisher treats it as permanent.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub tries: u32,
    pub delay: Duration,
    pub backoff: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 3,
            delay: Duration::from_secs(5),
            backoff: 2,
        }
    }
}

impl RetryPolicy {
    /// No retries, for tests and strictly-fatal callers.
    pub fn none() -> Self {
        Self {
            tries: 1,
            delay: Duration::ZERO,
            backoff: 1,
        }
    }

    pub fn run<T, F>(&self, operation: &str, mut f: F) -> Result<T, BrokerError>
    where
        F: FnMut() -> Result<T, BrokerError>,
    {
        let mut delay = self.delay;
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.tries => {
                    warn!(
                        operation,
                        attempt,
                        tries = self.tries,
                        error = %e,
                        "transient storage failure, retrying"
                    );
                    std::thread::sleep(delay);
                    delay *= self.backoff;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
