pub mod check;
pub mod config;
pub mod error;
pub mod files;
pub mod handler;
pub mod logging;
pub mod notify;
pub mod publish;
pub mod registry;
pub mod resolve;
pub mod storage;
pub mod worker;

pub use config::{load_config, PipelineConfig};
pub use error::{
    BrokerError, CheckError, ConfigError, ErrorKind, FileError, HandlerError, HarvestError,
    HookError, InflowError, NotifyError, PublishError, ResolveError, Result, WorkerError,
};
pub use files::{
    CheckResult, CheckState, CheckType, FileCollection, FileType, PipelineFile, PublishActions,
};
pub use handler::{
    CancelToken, Disposition, HandlerContext, HandlerOutcome, HandlerParams, HandlerRunner, Hooks,
    Phase, Sinks,
};
pub use logging::init_logging;
pub use notify::{LogNotifier, NotificationSummary, Notifier, Recipient};
pub use publish::harvest::{HarvestRecord, Harvester};
pub use publish::{ArchiveFailurePolicy, Publisher, PublishWarning};
pub use registry::{PathFunction, PluginRegistry};
pub use resolve::ResolveParams;
pub use storage::{broker_for_uri, LocalBroker, RemoteFile, RetryPolicy, StorageBroker};
pub use worker::{HandlerFactory, HandlerTable, Submission, SubmissionResult, WorkerPool};
