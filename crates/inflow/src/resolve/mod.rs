//! Populates the file collection from a heterogeneous input: a zip archive
//! is expanded into scratch, a manifest is dereferenced in place, anything
//! else is treated as a single file and copied into scratch.

pub mod archive;
pub mod manifest;
pub mod single;

use std::io::Read;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::error::ResolveError;
use crate::files::{FileCollection, FileType};

/// Handler-supplied knobs for the resolve step.
#[derive(Debug, Default, Clone)]
pub struct ResolveParams {
    /// Delete manifests are only honoured when the handler opts in.
    pub allow_delete_manifests: bool,
    /// When set, only files whose source name matches are kept.
    pub include: Option<Regex>,
    /// When set, files whose source name matches are removed. Exclusion
    /// wins over inclusion.
    pub exclude: Option<Regex>,
}

/// Resolve the submitted input into a populated collection. On return every
/// non-deletion record exists locally with checksum and size computed, and
/// the include/exclude filter has been applied.
pub fn resolve(
    input: &Path,
    scratch: &Path,
    params: &ResolveParams,
) -> Result<FileCollection, ResolveError> {
    let mut collection = match dispatch(input, params)? {
        InputKind::Archive => archive::expand(input, scratch)?,
        InputKind::Manifest => manifest::resolve_listing(input)?,
        InputKind::DeleteManifest => manifest::resolve_deletions(input)?,
        InputKind::Single => single::copy_into_scratch(input, scratch)?,
    };

    for file in collection.iter_mut() {
        file.compute_metadata()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ResolveError::MissingManifestEntry {
                    path: file.local_path().to_path_buf(),
                },
                _ => ResolveError::Materialise {
                    path: file.local_path().to_path_buf(),
                    source: e,
                },
            })?;
    }

    apply_filters(&mut collection, params);

    debug!(count = collection.len(), "resolve complete");
    Ok(collection)
}

enum InputKind {
    Archive,
    Manifest,
    DeleteManifest,
    Single,
}

/// Identify the input kind by extension, then confirm archives by content
/// sniff so a mislabelled file fails early with a clear error.
fn dispatch(input: &Path, params: &ResolveParams) -> Result<InputKind, ResolveError> {
    // Readability is a precondition for every input kind.
    std::fs::File::open(input).map_err(|e| ResolveError::UnreadableInput {
        path: input.to_path_buf(),
        source: e,
    })?;

    match FileType::from_path(input) {
        FileType::Zip => {
            if !sniff_magic(input, b"PK\x03\x04")? {
                return Err(ResolveError::InvalidFormat {
                    path: input.to_path_buf(),
                    expected: "zip",
                });
            }
            Ok(InputKind::Archive)
        }
        FileType::Manifest => Ok(InputKind::Manifest),
        FileType::DeleteManifest => {
            if !params.allow_delete_manifests {
                return Err(ResolveError::DeleteManifestNotAllowed {
                    path: input.to_path_buf(),
                });
            }
            Ok(InputKind::DeleteManifest)
        }
        _ => Ok(InputKind::Single),
    }
}

fn sniff_magic(path: &Path, magic: &[u8]) -> Result<bool, ResolveError> {
    let mut buf = vec![0u8; magic.len()];
    let mut file = std::fs::File::open(path).map_err(|e| ResolveError::UnreadableInput {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut read = 0;
    while read < buf.len() {
        let n = file
            .read(&mut buf[read..])
            .map_err(|e| ResolveError::UnreadableInput {
                path: path.to_path_buf(),
                source: e,
            })?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(read == magic.len() && buf == magic)
}

/// Excluded files are removed outright: they cannot participate in any
/// later phase and do not appear in the notification summary.
fn apply_filters(collection: &mut FileCollection, params: &ResolveParams) {
    if params.include.is_none() && params.exclude.is_none() {
        return;
    }

    collection.retain(|file| {
        let name = file.name();
        if let Some(exclude) = &params.exclude {
            if exclude.is_match(&name) {
                debug!(file = %name, "excluded by filter");
                return false;
            }
        }
        if let Some(include) = &params.include {
            if !include.is_match(&name) {
                debug!(file = %name, "not matched by include filter");
                return false;
            }
        }
        true
    });
}
