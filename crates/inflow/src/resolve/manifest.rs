use std::path::{Path, PathBuf};

use crate::error::ResolveError;
use crate::files::{FileCollection, PipelineFile};

/// A simple manifest: one local path per line, blank lines and `#` comments
/// skipped. Listed files are added in place with no copy, so they must
/// exist and be readable now.
pub fn resolve_listing(manifest: &Path) -> Result<FileCollection, ResolveError> {
    let mut collection = FileCollection::new();

    for line in read_lines(manifest)? {
        let path = PathBuf::from(&line);
        if !path.is_file() {
            return Err(ResolveError::MissingManifestEntry { path });
        }
        std::fs::File::open(&path)
            .map_err(|_| ResolveError::MissingManifestEntry { path: path.clone() })?;
        collection.add(PipelineFile::new(path.clone(), path))?;
    }

    Ok(collection)
}

/// A delete manifest: one store destination path per line. Each entry
/// becomes a deletion-intent record with no local materialisation; the
/// handler decides the publish type.
pub fn resolve_deletions(manifest: &Path) -> Result<FileCollection, ResolveError> {
    let mut collection = FileCollection::new();

    for line in read_lines(manifest)? {
        collection.add(PipelineFile::deletion(line))?;
    }

    Ok(collection)
}

fn read_lines(manifest: &Path) -> Result<Vec<String>, ResolveError> {
    let content = std::fs::read_to_string(manifest).map_err(|e| ResolveError::ManifestRead {
        path: manifest.to_path_buf(),
        source: e,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}
