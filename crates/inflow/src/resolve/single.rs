use std::path::Path;

use crate::error::ResolveError;
use crate::files::{FileCollection, PipelineFile};

/// Copy the single input file into the scratch directory and add it as the
/// sole record.
pub fn copy_into_scratch(input: &Path, scratch: &Path) -> Result<FileCollection, ResolveError> {
    let name = input
        .file_name()
        .ok_or_else(|| ResolveError::UnreadableInput {
            path: input.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
        })?;
    let dest = scratch.join(name);

    std::fs::copy(input, &dest).map_err(|e| ResolveError::Materialise {
        path: dest.clone(),
        source: e,
    })?;

    let mut collection = FileCollection::new();
    collection.add(PipelineFile::new(dest, input))?;
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copies_and_keeps_source_name() {
        let tmp = TempDir::new().unwrap();
        let incoming = tmp.path().join("incoming");
        let scratch = tmp.path().join("scratch");
        std::fs::create_dir_all(&incoming).unwrap();
        std::fs::create_dir_all(&scratch).unwrap();

        let input = incoming.join("good.nc");
        std::fs::write(&input, b"CDF\x01data").unwrap();

        let collection = copy_into_scratch(&input, &scratch).unwrap();

        assert_eq!(collection.len(), 1);
        let file = collection.iter().next().unwrap();
        assert_eq!(file.local_path(), scratch.join("good.nc"));
        assert_eq!(file.source_path(), input.as_path());
        assert!(file.local_path().exists());
        // The original stays where the watch service put it.
        assert!(input.exists());
    }

    #[test]
    fn test_missing_input_fails() {
        let tmp = TempDir::new().unwrap();
        let scratch = tmp.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();

        let err = copy_into_scratch(&tmp.path().join("gone.nc"), &scratch).unwrap_err();
        assert!(matches!(err, ResolveError::Materialise { .. }));
    }
}
