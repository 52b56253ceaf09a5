use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::FileError;

use super::file_type::FileType;

/// Which validation strategy applies to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckType {
    /// One or more named compliance suites run against the file.
    Compliance,
    /// Structural validation of the declared format only.
    Format,
    /// The file merely has to be nonempty.
    NonEmpty,
}

impl CheckType {
    /// Default dispatch: compliance when suites are configured and the file
    /// is a recognised scientific format, format-only for known types,
    /// nonempty otherwise. First match wins.
    pub fn dispatch(file_type: FileType, suites_configured: bool) -> Self {
        if suites_configured && file_type.is_scientific() {
            CheckType::Compliance
        } else if file_type.is_known() {
            CheckType::Format
        } else {
            CheckType::NonEmpty
        }
    }
}

/// Outcome of one check run against one file. The log is only populated for
/// non-compliant files, one diagnostic per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub compliant: bool,
    pub log: Vec<String>,
}

impl CheckResult {
    pub fn passed() -> Self {
        Self {
            compliant: true,
            log: Vec::new(),
        }
    }

    pub fn failed(log: Vec<String>) -> Self {
        Self {
            compliant: false,
            log,
        }
    }
}

/// Tri-state check status of a pipeline file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckState {
    #[default]
    NotChecked,
    Passed,
    Failed(Vec<String>),
}

impl CheckState {
    pub fn passed(&self) -> Option<bool> {
        match self {
            CheckState::NotChecked => None,
            CheckState::Passed => Some(true),
            CheckState::Failed(_) => Some(false),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CheckState::Failed(_))
    }
}

/// The action set flagged on a pipeline file. Flags are orthogonal; the one
/// exclusion (upload together with delete) is only legal for a
/// late-deletion replace and is enforced by [`PipelineFile::set_publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishActions {
    pub archive: bool,
    pub harvest_addition: bool,
    pub harvest_deletion: bool,
    pub upload: bool,
    pub delete: bool,
}

impl PublishActions {
    pub fn none() -> Self {
        Self::default()
    }

    /// Archive, harvest and upload: the standard treatment of a new file.
    pub fn harvest_upload() -> Self {
        Self {
            archive: true,
            harvest_addition: true,
            upload: true,
            ..Self::default()
        }
    }

    /// Unharvest and remove from the store: the standard treatment of a
    /// deletion record.
    pub fn delete_unharvest() -> Self {
        Self {
            harvest_deletion: true,
            delete: true,
            ..Self::default()
        }
    }

    pub fn upload_only() -> Self {
        Self {
            upload: true,
            ..Self::default()
        }
    }

    pub fn archive_only() -> Self {
        Self {
            archive: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn any_store_action(&self) -> bool {
        self.upload || self.delete
    }

    pub fn any_harvest_action(&self) -> bool {
        self.harvest_addition || self.harvest_deletion
    }
}

impl std::fmt::Display for PublishActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        if self.archive {
            names.push("archive");
        }
        if self.harvest_addition {
            names.push("harvest-addition");
        }
        if self.harvest_deletion {
            names.push("harvest-deletion");
        }
        if self.upload {
            names.push("upload");
        }
        if self.delete {
            names.push("delete");
        }
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// One unit of work tracked across phases.
///
/// Completion flags only ever go from false to true; destination attributes
/// freeze once the corresponding completion flag is set. Harvest rollback is
/// recorded in a separate flag so the underlying completion flag stays
/// monotonic while [`PipelineFile::is_harvested`] reports the effective
/// state.
#[derive(Debug, Clone)]
pub struct PipelineFile {
    local_path: PathBuf,
    source_path: PathBuf,
    file_type: FileType,
    check_type: Option<CheckType>,
    check_state: CheckState,
    publish: PublishActions,
    dest_path: Option<String>,
    archive_path: Option<String>,
    replaces_path: Option<String>,
    is_deletion: bool,
    late_deletion: bool,
    archived: bool,
    harvested: bool,
    harvest_undone: bool,
    stored: bool,
    checksum: Option<String>,
    size: Option<u64>,
}

impl PipelineFile {
    /// A regular file record. `local_path` is where the content currently
    /// lives on scratch; `source_path` is the name the uploader gave it.
    pub fn new<L: Into<PathBuf>, S: Into<PathBuf>>(local_path: L, source_path: S) -> Self {
        let source_path = source_path.into();
        let file_type = FileType::from_path(&source_path);
        Self {
            local_path: local_path.into(),
            source_path,
            file_type,
            check_type: Some(CheckType::dispatch(file_type, false)),
            check_state: CheckState::NotChecked,
            publish: PublishActions::none(),
            dest_path: None,
            archive_path: None,
            replaces_path: None,
            is_deletion: false,
            late_deletion: false,
            archived: false,
            harvested: false,
            harvest_undone: false,
            stored: false,
            checksum: None,
            size: None,
        }
    }

    /// A deletion-intent record. There is no local materialisation; the
    /// store destination doubles as the collection key, which the manifest
    /// formats already guarantee unique. Deletion records are never checked.
    pub fn deletion(dest_path: impl Into<String>) -> Self {
        let dest_path = dest_path.into();
        let mut file = Self::new(PathBuf::from(&dest_path), PathBuf::from(&dest_path));
        file.is_deletion = true;
        file.check_type = None;
        file.dest_path = Some(dest_path);
        file
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// The uploader-visible file name.
    pub fn name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source_path.to_string_lossy().to_string())
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn mime_type(&self) -> &'static str {
        self.file_type.mime_type()
    }

    pub fn check_type(&self) -> Option<CheckType> {
        self.check_type
    }

    pub fn set_check_type(&mut self, check_type: CheckType) {
        if !self.is_deletion {
            self.check_type = Some(check_type);
        }
    }

    pub fn check_state(&self) -> &CheckState {
        &self.check_state
    }

    pub fn set_check_result(&mut self, result: CheckResult) {
        self.check_state = if result.compliant {
            CheckState::Passed
        } else {
            CheckState::Failed(result.log)
        };
    }

    pub fn publish(&self) -> PublishActions {
        self.publish
    }

    pub fn set_publish(&mut self, actions: PublishActions) -> Result<(), FileError> {
        if actions.upload && actions.delete && !self.late_deletion {
            return Err(FileError::InvalidPublishType {
                file: self.name(),
                reason: "upload and delete are mutually exclusive unless late_deletion is set"
                    .to_string(),
            });
        }
        self.publish = actions;
        Ok(())
    }

    /// Drop all pending actions, e.g. for a failed file the handler chose
    /// to carry through without publishing.
    pub fn clear_publish(&mut self) {
        self.publish = PublishActions::none();
    }

    pub fn is_deletion(&self) -> bool {
        self.is_deletion
    }

    pub fn late_deletion(&self) -> bool {
        self.late_deletion
    }

    /// Enable the deferred-delete replace pattern. Must be set before the
    /// combined upload+delete publish type is assigned.
    pub fn set_late_deletion(&mut self, late: bool) {
        self.late_deletion = late;
    }

    pub fn dest_path(&self) -> Option<&str> {
        self.dest_path.as_deref()
    }

    pub fn set_dest_path(&mut self, dest_path: impl Into<String>) -> Result<(), FileError> {
        if self.stored || self.harvested {
            return Err(FileError::AttributeFrozen {
                attribute: "dest_path",
                file: self.name(),
            });
        }
        self.dest_path = Some(dest_path.into());
        Ok(())
    }

    pub fn archive_path(&self) -> Option<&str> {
        self.archive_path.as_deref()
    }

    pub fn set_archive_path(&mut self, archive_path: impl Into<String>) -> Result<(), FileError> {
        if self.archived {
            return Err(FileError::AttributeFrozen {
                attribute: "archive_path",
                file: self.name(),
            });
        }
        self.archive_path = Some(archive_path.into());
        Ok(())
    }

    /// The prior artifact this record supersedes; target of the deferred
    /// delete in the replace pattern.
    pub fn replaces_path(&self) -> Option<&str> {
        self.replaces_path.as_deref()
    }

    pub fn set_replaces_path(&mut self, path: impl Into<String>) {
        self.replaces_path = Some(path.into());
    }

    /// The store path a delete action removes.
    pub fn delete_target(&self) -> Option<&str> {
        self.replaces_path.as_deref().or(self.dest_path.as_deref())
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn is_harvested(&self) -> bool {
        self.harvested && !self.harvest_undone
    }

    pub fn is_harvest_undone(&self) -> bool {
        self.harvest_undone
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn mark_archived(&mut self) {
        self.archived = true;
    }

    pub fn mark_harvested(&mut self) {
        self.harvested = true;
    }

    pub fn mark_harvest_undone(&mut self) {
        self.harvest_undone = true;
    }

    pub fn mark_stored(&mut self) {
        self.stored = true;
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Compute SHA-256 checksum and size from the local materialisation.
    /// No-op for deletion records, which have none.
    pub fn compute_metadata(&mut self) -> std::io::Result<()> {
        if self.is_deletion {
            return Ok(());
        }
        let content = std::fs::read(&self.local_path)?;
        let mut hasher = Sha256::new();
        hasher.update(&content);
        self.checksum = Some(format!("{:x}", hasher.finalize()));
        self.size = Some(content.len() as u64);
        Ok(())
    }

    /// Pending-action predicates used by the publisher.
    pub fn pending_archive(&self) -> bool {
        self.publish.archive && !self.archived
    }

    pub fn pending_harvest_addition(&self) -> bool {
        self.publish.harvest_addition && !self.harvested
    }

    pub fn pending_harvest_deletion(&self) -> bool {
        self.publish.harvest_deletion && !self.harvested
    }

    pub fn pending_upload(&self) -> bool {
        self.publish.upload && !self.stored
    }

    pub fn pending_delete(&self) -> bool {
        // A late-deletion delete stays pending after the upload marked the
        // file stored; completion is tracked by the publisher in-run.
        self.publish.delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_file_derives_type_and_check_type() {
        let f = PipelineFile::new("/scratch/good.nc", "good.nc");
        assert_eq!(f.file_type(), FileType::NetCdf);
        assert_eq!(f.check_type(), Some(CheckType::Format));
        assert_eq!(f.check_state().passed(), None);
        assert_eq!(f.name(), "good.nc");
        assert!(!f.is_deletion());
    }

    #[test]
    fn test_check_type_dispatch() {
        assert_eq!(
            CheckType::dispatch(FileType::NetCdf, true),
            CheckType::Compliance
        );
        assert_eq!(
            CheckType::dispatch(FileType::NetCdf, false),
            CheckType::Format
        );
        // Suites configured but not a scientific format: format check.
        assert_eq!(CheckType::dispatch(FileType::Csv, true), CheckType::Format);
        assert_eq!(
            CheckType::dispatch(FileType::Unknown, true),
            CheckType::NonEmpty
        );
    }

    #[test]
    fn test_deletion_record() {
        let f = PipelineFile::deletion("IMOS/old/file.nc");
        assert!(f.is_deletion());
        assert_eq!(f.check_type(), None);
        assert_eq!(f.dest_path(), Some("IMOS/old/file.nc"));
        assert_eq!(f.delete_target(), Some("IMOS/old/file.nc"));
    }

    #[test]
    fn test_upload_plus_delete_requires_late_deletion() {
        let mut f = PipelineFile::new("/scratch/a.nc", "a.nc");
        let combined = PublishActions {
            upload: true,
            delete: true,
            ..PublishActions::default()
        };
        assert!(f.set_publish(combined).is_err());

        f.set_late_deletion(true);
        assert!(f.set_publish(combined).is_ok());
    }

    #[test]
    fn test_dest_path_frozen_after_store() {
        let mut f = PipelineFile::new("/scratch/a.nc", "a.nc");
        f.set_dest_path("IMOS/a.nc").unwrap();
        f.mark_stored();

        let err = f.set_dest_path("IMOS/b.nc").unwrap_err();
        assert!(matches!(err, FileError::AttributeFrozen { .. }));
        assert_eq!(f.dest_path(), Some("IMOS/a.nc"));
    }

    #[test]
    fn test_archive_path_frozen_after_archive() {
        let mut f = PipelineFile::new("/scratch/a.nc", "a.nc");
        f.set_archive_path("2026/a.nc").unwrap();
        f.mark_archived();
        assert!(f.set_archive_path("2026/b.nc").is_err());
    }

    #[test]
    fn test_harvest_rollback_visibility() {
        let mut f = PipelineFile::new("/scratch/a.nc", "a.nc");
        f.mark_harvested();
        assert!(f.is_harvested());

        f.mark_harvest_undone();
        assert!(!f.is_harvested());
        assert!(f.is_harvest_undone());
    }

    #[test]
    fn test_delete_target_prefers_replaces_path() {
        let mut f = PipelineFile::new("/scratch/a_v2.nc", "a_v2.nc");
        f.set_dest_path("IMOS/a_v2.nc").unwrap();
        f.set_replaces_path("IMOS/a_v1.nc");
        assert_eq!(f.delete_target(), Some("IMOS/a_v1.nc"));
    }

    #[test]
    fn test_compute_metadata() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        std::fs::write(&path, b"a,b\n1,2\n").unwrap();

        let mut f = PipelineFile::new(&path, "data.csv");
        f.compute_metadata().unwrap();

        assert_eq!(f.size(), Some(8));
        // SHA-256 is 32 bytes, 64 hex characters.
        assert_eq!(f.checksum().unwrap().len(), 64);
    }

    #[test]
    fn test_pending_predicates() {
        let mut f = PipelineFile::new("/scratch/a.nc", "a.nc");
        f.set_publish(PublishActions::harvest_upload()).unwrap();

        assert!(f.pending_archive());
        assert!(f.pending_harvest_addition());
        assert!(f.pending_upload());
        assert!(!f.pending_delete());

        f.mark_archived();
        f.mark_harvested();
        f.mark_stored();

        assert!(!f.pending_archive());
        assert!(!f.pending_harvest_addition());
        assert!(!f.pending_upload());
    }

    #[test]
    fn test_publish_actions_display() {
        assert_eq!(PublishActions::none().to_string(), "none");
        assert_eq!(
            PublishActions::harvest_upload().to_string(),
            "archive+harvest-addition+upload"
        );
        assert_eq!(
            PublishActions::delete_unharvest().to_string(),
            "harvest-deletion+delete"
        );
    }
}
