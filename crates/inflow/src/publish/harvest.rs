use std::path::PathBuf;

use crate::error::HarvestError;
use crate::files::PipelineFile;

/// What a harvester gets to see of a pipeline file: where the content is
/// locally (absent for deletions) and where it lives in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestRecord {
    pub local_path: Option<PathBuf>,
    pub dest_path: String,
}

impl HarvestRecord {
    pub fn from_file(file: &PipelineFile) -> Self {
        Self {
            local_path: if file.is_deletion() {
                None
            } else {
                Some(file.local_path().to_path_buf())
            },
            dest_path: file.dest_path().unwrap_or_default().to_string(),
        }
    }
}

/// External tool that ingests catalog records describing stored artifacts.
/// Invocations are grouped and serialised by the publisher; implementations
/// need not be concurrency-safe.
pub trait Harvester: Send + Sync {
    fn name(&self) -> &str;

    /// Ingest catalog records for the given files.
    fn ingest(&self, records: &[HarvestRecord]) -> Result<(), HarvestError>;

    /// Remove catalog records for the given files.
    fn remove(&self, records: &[HarvestRecord]) -> Result<(), HarvestError>;

    /// Whether `remove` is implemented. Harvesters without deletion support
    /// cannot be rolled back; the publisher fails loudly instead of leaving
    /// stale catalog entries unannounced.
    fn supports_deletion(&self) -> bool {
        true
    }

    /// Submit one group of additions and deletions. The default applies
    /// additions first, then deletions; a harvester with transactional
    /// semantics may override this to submit both in one transaction.
    fn apply(
        &self,
        additions: &[HarvestRecord],
        deletions: &[HarvestRecord],
    ) -> Result<(), HarvestError> {
        if !additions.is_empty() {
            self.ingest(additions)?;
        }
        if !deletions.is_empty() {
            self.remove(deletions)?;
        }
        Ok(())
    }
}
