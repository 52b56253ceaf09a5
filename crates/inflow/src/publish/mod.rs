//! Drives per-file side effects against the external sinks.
//!
//! The order is deliberate and load-bearing: **archive, then harvest, then
//! store**. Harvest-before-store accepts a brief window where a catalog
//! entry references an object not yet present, but guarantees that once
//! store completes both catalog and object exist; store-before-harvest
//! would instead leave objects undiscoverable. The exposure window is
//! shrunk by the rollback rule: if a store operation fails after files were
//! harvested in this run, compensating deletions are submitted to their
//! harvesters. Archive is best-effort parallel durability and never
//! triggers rollback of harvest or store. Do not reorder these steps
//! without revisiting that reasoning.

pub mod harvest;

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::{FileError, HarvestError, PublishError};
use crate::files::{FileCollection, PipelineFile};
use crate::registry::PluginRegistry;
use crate::storage::{RetryPolicy, StorageBroker};

use harvest::HarvestRecord;

/// Whether a failed archive put aborts the run or degrades to a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFailurePolicy {
    #[default]
    Fatal,
    WarnOnly,
}

/// Non-fatal publish outcomes reported through the notification summary.
#[derive(Debug, Clone)]
pub struct PublishWarning {
    pub file: String,
    pub message: String,
}

impl std::fmt::Display for PublishWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

pub struct Publisher<'a> {
    store: &'a dyn StorageBroker,
    archive: &'a dyn StorageBroker,
    registry: &'a PluginRegistry,
    archive_policy: ArchiveFailurePolicy,
    retry: RetryPolicy,
}

impl<'a> Publisher<'a> {
    pub fn new(
        store: &'a dyn StorageBroker,
        archive: &'a dyn StorageBroker,
        registry: &'a PluginRegistry,
    ) -> Self {
        Self {
            store,
            archive,
            registry,
            archive_policy: ArchiveFailurePolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_archive_policy(mut self, policy: ArchiveFailurePolicy) -> Self {
        self.archive_policy = policy;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run all pending per-file actions. Files are processed in insertion
    /// order within each step; harvester invocations are serialised.
    pub fn publish(
        &self,
        files: &mut FileCollection,
    ) -> Result<Vec<PublishWarning>, PublishError> {
        self.preflight(files)?;

        let mut warnings = Vec::new();
        self.archive_files(files, &mut warnings)?;

        let mut harvested_groups = Vec::new();
        if let Err(e) = self.harvest_files(files, &mut harvested_groups) {
            self.compensate(files, &harvested_groups)?;
            return Err(e);
        }

        self.store_files(files, &harvested_groups)?;

        debug_assert!(files.iter().all(verify_completion));
        Ok(warnings)
    }

    /// Every pending action must have its preconditions in place before any
    /// side effect runs: checks passed (or never applicable), the
    /// destination attributes set, and every harvest-flagged file routable
    /// to a registered harvester.
    fn preflight(&self, files: &FileCollection) -> Result<(), PublishError> {
        let mut unmatched = Vec::new();
        for file in files.iter() {
            let publish = file.publish();
            if publish.is_empty() {
                continue;
            }
            if file.check_state().is_failed() {
                return Err(FileError::InvalidPublishType {
                    file: file.name(),
                    reason: format!("publish type '{publish}' set on a file that failed checks"),
                }
                .into());
            }
            if (publish.any_store_action() || publish.any_harvest_action())
                && file.dest_path().is_none()
            {
                return Err(FileError::AttributeNotSet {
                    attribute: "dest_path",
                    file: file.name(),
                }
                .into());
            }
            if publish.archive && file.archive_path().is_none() {
                return Err(FileError::AttributeNotSet {
                    attribute: "archive_path",
                    file: file.name(),
                }
                .into());
            }
            if publish.any_harvest_action()
                && self
                    .registry
                    .match_harvester(file.dest_path().unwrap_or_default())
                    .is_none()
            {
                unmatched.push(file.name());
            }
        }
        if !unmatched.is_empty() {
            return Err(HarvestError::NoMatchingHarvester { files: unmatched }.into());
        }
        Ok(())
    }

    fn archive_files(
        &self,
        files: &mut FileCollection,
        warnings: &mut Vec<PublishWarning>,
    ) -> Result<(), PublishError> {
        for file in files.filter_mut(|f| f.pending_archive()) {
            let archive_path = file.archive_path().unwrap_or_default().to_string();
            let local = file.local_path().to_path_buf();

            match self
                .retry
                .run("archive", || self.archive.put(&local, &archive_path))
            {
                Ok(()) => {
                    info!(file = %file.name(), archive_path = %archive_path, "archived");
                    file.mark_archived();
                }
                Err(e) => match self.archive_policy {
                    ArchiveFailurePolicy::Fatal => {
                        return Err(PublishError::Archive {
                            file: file.name(),
                            source: e,
                        });
                    }
                    ArchiveFailurePolicy::WarnOnly => {
                        warn!(file = %file.name(), error = %e, "archive failed, continuing");
                        warnings.push(PublishWarning {
                            file: file.name(),
                            message: format!("archive failed: {e}"),
                        });
                    }
                },
            }
        }
        Ok(())
    }

    /// Group pending harvest files by their matching harvester and submit
    /// one call per group. Successfully harvested groups are recorded so a
    /// later failure can compensate them.
    fn harvest_files(
        &self,
        files: &mut FileCollection,
        harvested_groups: &mut Vec<(String, Vec<PathBuf>)>,
    ) -> Result<(), PublishError> {
        let mut groups: Vec<(String, Vec<PathBuf>)> = Vec::new();

        for file in files.filter(|f| f.pending_harvest_addition() || f.pending_harvest_deletion())
        {
            let dest_path = file.dest_path().unwrap_or_default();
            let (name, _) = self
                .registry
                .match_harvester(dest_path)
                .expect("routability verified in preflight");
            let key = file.local_path().to_path_buf();
            match groups.iter_mut().find(|(n, _)| n == name) {
                Some((_, members)) => members.push(key),
                None => groups.push((name.to_string(), vec![key])),
            }
        }

        for (name, members) in groups {
            let harvester = self
                .registry
                .harvester(&name)
                .expect("matched harvester is registered");

            let mut additions = Vec::new();
            let mut deletions = Vec::new();
            for key in &members {
                let file = files.get(key).expect("grouped file is in collection");
                if file.pending_harvest_addition() {
                    additions.push(HarvestRecord::from_file(file));
                } else {
                    deletions.push(HarvestRecord::from_file(file));
                }
            }

            info!(
                harvester = %name,
                additions = additions.len(),
                deletions = deletions.len(),
                "invoking harvester"
            );
            harvester
                .apply(&additions, &deletions)
                .map_err(PublishError::Harvest)?;

            for key in &members {
                if let Some(file) = files.get_mut(key) {
                    file.mark_harvested();
                }
            }
            harvested_groups.push((name, members));
        }

        Ok(())
    }

    fn store_files(
        &self,
        files: &mut FileCollection,
        harvested_groups: &[(String, Vec<PathBuf>)],
    ) -> Result<(), PublishError> {
        // Uploads first. A failure here triggers the compensating harvest
        // deletions for everything harvested in this run.
        let upload_keys: Vec<PathBuf> = files
            .filter(|f| f.pending_upload())
            .map(|f| f.local_path().to_path_buf())
            .collect();

        for key in upload_keys {
            let file = files.get(&key).expect("upload key is in collection");
            let name = file.name();
            let dest_path = file.dest_path().unwrap_or_default().to_string();
            let local = file.local_path().to_path_buf();

            if let Err(e) = self.retry.run("store put", || self.store.put(&local, &dest_path)) {
                error!(file = %name, error = %e, "store failed after harvest, compensating");
                self.compensate(files, harvested_groups)?;
                return Err(PublishError::Store {
                    file: name,
                    source: e,
                });
            }

            info!(file = %name, dest_path = %dest_path, "stored");
            files
                .get_mut(&key)
                .expect("upload key is in collection")
                .mark_stored();
        }

        // Deletions second, so a late-deletion replace only removes the
        // superseded artifact once the new content is in place.
        let delete_keys: Vec<PathBuf> = files
            .filter(|f| f.pending_delete())
            .map(|f| f.local_path().to_path_buf())
            .collect();

        for key in delete_keys {
            let file = files.get(&key).expect("delete key is in collection");
            let name = file.name();
            let target = match file.delete_target() {
                Some(t) => t.to_string(),
                None => {
                    return Err(FileError::AttributeNotSet {
                        attribute: "dest_path",
                        file: name,
                    }
                    .into())
                }
            };

            self.retry
                .run("store delete", || self.store.delete(&target))
                .map_err(|e| PublishError::Store {
                    file: name.clone(),
                    source: e,
                })?;

            info!(file = %name, target = %target, "deleted from store");
            files
                .get_mut(&key)
                .expect("delete key is in collection")
                .mark_stored();
        }

        Ok(())
    }

    /// Submit compensating deletions for every group harvested in this run.
    /// A harvester without deletion support makes the stale entries
    /// unrecoverable here, which is reported as its own error rather than
    /// silently ignored.
    fn compensate(
        &self,
        files: &mut FileCollection,
        harvested_groups: &[(String, Vec<PathBuf>)],
    ) -> Result<(), PublishError> {
        for (name, members) in harvested_groups {
            let harvester = self
                .registry
                .harvester(name)
                .expect("harvested group is registered");

            if !harvester.supports_deletion() {
                return Err(HarvestError::RollbackUnsupported {
                    name: name.clone(),
                    files: members
                        .iter()
                        .map(|k| k.to_string_lossy().to_string())
                        .collect(),
                }
                .into());
            }

            let records: Vec<HarvestRecord> = members
                .iter()
                .filter_map(|k| files.get(k))
                .map(HarvestRecord::from_file)
                .collect();

            warn!(harvester = %name, count = records.len(), "rolling back harvest");
            harvester.remove(&records).map_err(PublishError::Harvest)?;

            for key in members {
                if let Some(file) = files.get_mut(key) {
                    file.mark_harvest_undone();
                }
            }
        }
        Ok(())
    }
}

/// Consistency conditions every published file must satisfy once the
/// publisher returns cleanly.
pub fn verify_completion(file: &PipelineFile) -> bool {
    // A stored file either needed no harvest or its harvester ran.
    if file.is_stored() && file.publish().harvest_addition && !file.is_harvested() {
        return false;
    }
    // A harvested addition either stored or was compensated.
    if file.is_harvested() && file.publish().upload && !file.is_stored() {
        return false;
    }
    true
}
