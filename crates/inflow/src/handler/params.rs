use crate::files::PublishActions;
use crate::notify::Recipient;
use crate::publish::ArchiveFailurePolicy;
use crate::resolve::ResolveParams;

/// Handler-supplied parameter values: what to check, what to publish by
/// default, how strictly to treat failures, and who to tell about it.
pub struct HandlerParams {
    /// Compliance suite names to run against scientific-format files.
    /// Must be registered in the plugin registry.
    pub check_suites: Vec<String>,
    pub resolve: ResolveParams,
    /// When set, files that fail checks are stripped of their publish
    /// actions and the run completes as success with warnings instead of
    /// failing fast.
    pub continue_on_check_failure: bool,
    pub archive_policy: ArchiveFailurePolicy,
    /// Applied to non-deletion files whose publish type is still unset
    /// after resolve; hooks may override per file. `None` leaves files
    /// action-less unless a hook says otherwise.
    pub default_publish: Option<PublishActions>,
    /// Same, for deletion records.
    pub default_deletion_publish: Option<PublishActions>,
    pub success_recipients: Vec<Recipient>,
    pub error_recipients: Vec<Recipient>,
}

impl Default for HandlerParams {
    fn default() -> Self {
        Self {
            check_suites: Vec::new(),
            resolve: ResolveParams::default(),
            continue_on_check_failure: false,
            archive_policy: ArchiveFailurePolicy::default(),
            default_publish: Some(PublishActions::harvest_upload()),
            default_deletion_publish: Some(PublishActions::delete_unharvest()),
            success_recipients: Vec::new(),
            error_recipients: Vec::new(),
        }
    }
}
