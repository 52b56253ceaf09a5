use std::path::{Component, Path};

use tracing::debug;
use zip::ZipArchive;

use crate::error::ResolveError;
use crate::files::{FileCollection, PipelineFile};

/// Expand a zip archive into the scratch directory, preserving the entry
/// hierarchy. Entries that would land outside the scratch directory
/// (absolute paths, `..` segments) abort the whole resolve.
pub fn expand(input: &Path, scratch: &Path) -> Result<FileCollection, ResolveError> {
    let file = std::fs::File::open(input).map_err(|e| ResolveError::UnreadableInput {
        path: input.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| ResolveError::ArchiveExpansion {
        path: input.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut collection = FileCollection::new();

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ResolveError::ArchiveExpansion {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })?;
        if entry.is_dir() {
            continue;
        }

        let entry_name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| ResolveError::UnsafeArchiveEntry {
                entry: entry_name.clone(),
            })?;
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return Err(ResolveError::UnsafeArchiveEntry { entry: entry_name });
        }

        let dest = scratch.join(&relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResolveError::Materialise {
                path: dest.clone(),
                source: e,
            })?;
        }

        let mut out = std::fs::File::create(&dest).map_err(|e| ResolveError::Materialise {
            path: dest.clone(),
            source: e,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|e| ResolveError::Materialise {
            path: dest.clone(),
            source: e,
        })?;

        debug!(entry = %entry_name, dest = %dest.display(), "expanded archive entry");
        collection.add(PipelineFile::new(dest, relative))?;
    }

    Ok(collection)
}
