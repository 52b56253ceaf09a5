use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::BrokerError;

use super::{validate_remote_path, RemoteFile, StorageBroker};

/// Storage backend for a local directory tree (`file://` URIs).
pub struct LocalBroker {
    prefix: PathBuf,
}

impl LocalBroker {
    pub fn new<P: AsRef<Path>>(prefix: P) -> Self {
        Self {
            prefix: prefix.as_ref().to_path_buf(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn absolute(&self, remote: &str) -> Result<PathBuf, BrokerError> {
        validate_remote_path(remote)?;
        Ok(self.prefix.join(remote))
    }

    fn classify(operation: &'static str, target: &str, e: std::io::Error) -> BrokerError {
        // Interrupted and timeout conditions are worth another attempt;
        // everything else from a local filesystem is authoritative.
        match e.kind() {
            std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock => BrokerError::Transient {
                operation,
                target: target.to_string(),
                source: e,
            },
            _ => BrokerError::Permanent {
                operation,
                target: target.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

impl StorageBroker for LocalBroker {
    fn put(&self, local: &Path, remote: &str) -> Result<(), BrokerError> {
        let abs = self.absolute(remote)?;
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::classify("put", remote, e))?;
        }
        std::fs::copy(local, &abs).map_err(|e| Self::classify("put", remote, e))?;
        Ok(())
    }

    fn delete(&self, remote: &str) -> Result<(), BrokerError> {
        let abs = self.absolute(remote)?;
        match std::fs::remove_file(&abs) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::classify("delete", remote, e)),
        }
    }

    fn exists(&self, remote: &str) -> Result<bool, BrokerError> {
        let abs = self.absolute(remote)?;
        Ok(abs.exists())
    }

    fn query(&self, prefix: &str) -> Result<Vec<RemoteFile>, BrokerError> {
        validate_remote_path(prefix)?;
        let full_query = self.prefix.join(prefix);
        let walk_root = if prefix.is_empty() || prefix.ends_with('/') {
            full_query.clone()
        } else {
            full_query
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.prefix.clone())
        };

        let mut results = Vec::new();
        if !walk_root.exists() {
            return Ok(results);
        }

        for entry in WalkDir::new(&walk_root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || entry.path_is_symlink() {
                continue;
            }
            if !entry.path().starts_with(&full_query) {
                // Prefix-style query: partial file name matches count too.
                if !entry
                    .path()
                    .to_string_lossy()
                    .starts_with(&full_query.to_string_lossy().to_string())
                {
                    continue;
                }
            }
            let metadata = entry
                .metadata()
                .map_err(|e| BrokerError::Permanent {
                    operation: "query",
                    target: prefix.to_string(),
                    reason: e.to_string(),
                })?;
            let dest_path = entry
                .path()
                .strip_prefix(&self.prefix)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let last_modified: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());
            results.push(RemoteFile {
                dest_path,
                size: metadata.len(),
                last_modified,
            });
        }

        results.sort_by(|a, b| a.dest_path.cmp(&b.dest_path));
        Ok(results)
    }
}
