use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

use crate::check::{CheckSuite, Checker};
use crate::config::PipelineConfig;
use crate::error::{BrokerError, CheckError, ErrorKind, HandlerError};
use crate::files::{CheckType, PipelineFile};
use crate::notify::{LogNotifier, NotificationSummary, Notifier, Recipient};
use crate::publish::Publisher;
use crate::registry::{PathFunction, PluginRegistry};
use crate::storage::{broker_for_uri, RetryPolicy, StorageBroker};

use super::context::{CancelToken, Disposition, HandlerContext, Phase, PhaseFailure, ScratchDir};
use super::hooks::Hooks;
use super::params::HandlerParams;

/// Sink clients handed to the handler by reference. Pooled at process
/// scope in a worker deployment; built per-handler from the config URIs
/// otherwise.
#[derive(Clone)]
pub struct Sinks {
    pub store: Arc<dyn StorageBroker>,
    pub archive: Arc<dyn StorageBroker>,
    /// Failed inputs are copied here for operator inspection, when set.
    pub error: Option<Arc<dyn StorageBroker>>,
}

impl Sinks {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, BrokerError> {
        Ok(Self {
            store: Arc::from(broker_for_uri(&config.global.upload_uri)?),
            archive: Arc::from(broker_for_uri(&config.global.archive_uri)?),
            error: Some(Arc::from(broker_for_uri(&config.global.error_uri)?)),
        })
    }
}

/// What one execution reports back: the terminal disposition, the recorded
/// failure (if any) and the notification payload.
#[derive(Debug)]
pub struct HandlerOutcome {
    pub disposition: Disposition,
    pub error: Option<(ErrorKind, String)>,
    pub summary: NotificationSummary,
}

/// Drives one input submission through the fixed phase sequence:
/// initialise, resolve, preprocess, check, process, publish, postprocess,
/// notify. Any phase failure records the error and jumps to notify, which
/// always runs. One instance executes exactly once.
pub struct HandlerRunner {
    id: String,
    input_file: PathBuf,
    config: Arc<PipelineConfig>,
    registry: Arc<PluginRegistry>,
    sinks: Sinks,
    params: HandlerParams,
    hooks: Hooks,
    path_function: Option<PathFunction>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    cancel: CancelToken,
    has_run: bool,
}

impl HandlerRunner {
    pub fn new(
        input_file: impl Into<PathBuf>,
        config: Arc<PipelineConfig>,
        registry: Arc<PluginRegistry>,
        sinks: Sinks,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            input_file: input_file.into(),
            config,
            registry,
            sinks,
            params: HandlerParams::default(),
            hooks: Hooks::default(),
            path_function: None,
            notifier: Arc::new(LogNotifier),
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
            has_run: false,
        }
    }

    /// Production constructor: builds the sink clients from the config URIs.
    pub fn from_config(
        input_file: impl Into<PathBuf>,
        config: Arc<PipelineConfig>,
        registry: Arc<PluginRegistry>,
    ) -> Result<Self, BrokerError> {
        let sinks = Sinks::from_config(&config)?;
        Ok(Self::new(input_file, config, registry, sinks))
    }

    pub fn with_params(mut self, params: HandlerParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_path_function(mut self, function: PathFunction) -> Self {
        self.path_function = Some(function);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle for requesting cooperative cancellation from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the handler to completion. Returns an error only when called a
    /// second time on the same instance; every in-run failure is reported
    /// through the outcome after notification has run.
    pub fn execute(&mut self) -> Result<HandlerOutcome, HandlerError> {
        if self.has_run {
            return Err(HandlerError::AlreadyRun);
        }
        self.has_run = true;

        let input_name = self
            .input_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.input_file.to_string_lossy().to_string());
        let _span = info_span!("handler", id = %self.id, input = %input_name).entered();

        let mut ctx = HandlerContext::new(self.input_file.clone());

        let disposition = match self.run_phases(&mut ctx) {
            Ok(disposition) => disposition,
            Err(e) => {
                let kind = e.kind();
                error!(phase = %ctx.phase, kind = %kind, error = %e, "phase failed");
                ctx.failure = Some(PhaseFailure {
                    phase: ctx.phase,
                    kind,
                    message: e.to_string(),
                });
                if kind == ErrorKind::CheckFailure {
                    Disposition::CheckFailed
                } else {
                    Disposition::Failed
                }
            }
        };

        if matches!(disposition, Disposition::CheckFailed | Disposition::Failed) {
            self.quarantine_input(&ctx);
        }

        let summary = self.notify(&mut ctx, disposition);

        ctx.phase = match disposition {
            Disposition::Success => Phase::Succeeded,
            _ => Phase::Failed,
        };
        ctx.drop_scratch();

        Ok(HandlerOutcome {
            disposition,
            error: ctx
                .failure
                .as_ref()
                .map(|f| (f.kind, f.message.clone())),
            summary,
        })
    }

    fn run_phases(&self, ctx: &mut HandlerContext) -> Result<Disposition, HandlerError> {
        ctx.phase = Phase::Initialise;
        {
            let _s = info_span!("initialise").entered();
            self.initialise(ctx)?;
        }
        if self.cancel.is_cancelled() {
            return Ok(Disposition::Cancelled);
        }

        ctx.phase = Phase::Resolve;
        {
            let _s = info_span!("resolve").entered();
            self.resolve(ctx)?;
        }
        if self.cancel.is_cancelled() {
            return Ok(Disposition::Cancelled);
        }

        ctx.phase = Phase::Preprocess;
        if let Some(hook) = &self.hooks.preprocess {
            let _s = info_span!("preprocess").entered();
            hook.run(ctx).map_err(|e| HandlerError::Hook {
                phase: "preprocess",
                source: e,
            })?;
        }
        if self.cancel.is_cancelled() {
            return Ok(Disposition::Cancelled);
        }

        ctx.phase = Phase::Check;
        {
            let _s = info_span!("check").entered();
            self.check(ctx)?;
        }
        if self.cancel.is_cancelled() {
            return Ok(Disposition::Cancelled);
        }

        ctx.phase = Phase::Process;
        if let Some(hook) = &self.hooks.process {
            let _s = info_span!("process").entered();
            hook.run(ctx).map_err(|e| HandlerError::Hook {
                phase: "process",
                source: e,
            })?;
        }
        if self.cancel.is_cancelled() {
            return Ok(Disposition::Cancelled);
        }

        ctx.phase = Phase::Publish;
        {
            let _s = info_span!("publish").entered();
            self.publish(ctx)?;
        }
        if self.cancel.is_cancelled() {
            return Ok(Disposition::Cancelled);
        }

        ctx.phase = Phase::Postprocess;
        if let Some(hook) = &self.hooks.postprocess {
            let _s = info_span!("postprocess").entered();
            hook.run(ctx).map_err(|e| HandlerError::Hook {
                phase: "postprocess",
                source: e,
            })?;
        }

        Ok(Disposition::Success)
    }

    fn initialise(&self, ctx: &mut HandlerContext) -> Result<(), HandlerError> {
        std::fs::File::open(&ctx.input_file).map_err(|e| HandlerError::InvalidInput {
            path: ctx.input_file.clone(),
            source: e,
        })?;

        let base = self.config.global.processing_dir.clone();
        let scratch =
            ScratchDir::create(&base, &self.id).map_err(|e| HandlerError::Scratch {
                path: base,
                source: e,
            })?;
        debug!(scratch = %scratch.path().display(), "created scratch directory");
        ctx.attach_scratch(scratch);
        Ok(())
    }

    fn resolve(&self, ctx: &mut HandlerContext) -> Result<(), HandlerError> {
        let scratch = ctx
            .scratch_path()
            .expect("scratch directory created during initialise")
            .to_path_buf();

        ctx.files = crate::resolve::resolve(&ctx.input_file, &scratch, &self.params.resolve)?;

        let suites_configured = !self.params.check_suites.is_empty();
        for file in ctx.files.iter_mut() {
            if !file.is_deletion() {
                file.set_check_type(CheckType::dispatch(file.file_type(), suites_configured));
            }
            if file.publish().is_empty() {
                let default = if file.is_deletion() {
                    self.params.default_deletion_publish
                } else {
                    self.params.default_publish
                };
                if let Some(actions) = default {
                    file.set_publish(actions)?;
                }
            }
        }
        Ok(())
    }

    fn check(&self, ctx: &mut HandlerContext) -> Result<(), HandlerError> {
        let mut suites: Vec<Arc<dyn CheckSuite>> = Vec::new();
        for name in &self.params.check_suites {
            let suite = self
                .registry
                .check_suite(name)
                .ok_or_else(|| CheckError::UnknownSuite { name: name.clone() })?;
            suites.push(suite);
        }

        let summary = Checker::new(suites).run(&mut ctx.files)?;
        if summary.all_passed() {
            return Ok(());
        }

        if self.params.continue_on_check_failure {
            for name in &summary.failed {
                ctx.warnings
                    .push(format!("check failed, file excluded from publishing: {name}"));
            }
            for file in ctx.files.filter_mut(|f| f.check_state().is_failed()) {
                file.clear_publish();
            }
            Ok(())
        } else {
            Err(summary.into_error().into())
        }
    }

    fn publish(&self, ctx: &mut HandlerContext) -> Result<(), HandlerError> {
        for file in ctx.files.iter_mut() {
            if file.publish().is_empty() {
                continue;
            }
            if file.dest_path().is_none() {
                let dest = match &self.path_function {
                    Some(function) => function.as_ref()(file),
                    None => default_dest_path(file, &self.config.watch.incoming_dir),
                };
                file.set_dest_path(dest)?;
            }
            if file.publish().archive && file.archive_path().is_none() {
                let dest = file
                    .dest_path()
                    .expect("dest_path assigned above")
                    .to_string();
                file.set_archive_path(dest)?;
            }
        }

        let warnings = Publisher::new(
            self.sinks.store.as_ref(),
            self.sinks.archive.as_ref(),
            self.registry.as_ref(),
        )
        .with_archive_policy(self.params.archive_policy)
        .with_retry_policy(self.retry)
        .publish(&mut ctx.files)?;

        ctx.warnings.extend(warnings.iter().map(ToString::to_string));
        Ok(())
    }

    /// Best-effort copy of the failed input to the error sink for operator
    /// inspection. Never changes the disposition.
    fn quarantine_input(&self, ctx: &HandlerContext) {
        let Some(error_sink) = &self.sinks.error else {
            return;
        };
        let name = ctx
            .input_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "input".to_string());
        let remote = format!("{}/{}", self.id, name);
        match error_sink.put(&ctx.input_file, &remote) {
            Ok(()) => debug!(remote = %remote, "input moved to error sink"),
            Err(e) => warn!(error = %e, "failed to move input to error sink"),
        }
    }

    /// Notification always runs; a delivery failure is logged and swallowed.
    fn notify(&self, ctx: &mut HandlerContext, disposition: Disposition) -> NotificationSummary {
        ctx.phase = Phase::Notify;
        let _s = info_span!("notify").entered();

        let summary = NotificationSummary::new(
            self.id.clone(),
            ctx.input_file.clone(),
            disposition,
            ctx.failure.as_ref().map(|f| (f.kind, f.message.clone())),
            ctx.warnings.clone(),
            &ctx.files,
        );

        let mut recipients: Vec<Recipient> = match disposition {
            Disposition::Success => self.params.success_recipients.clone(),
            _ => self.params.error_recipients.clone(),
        };
        if disposition == Disposition::Failed {
            // System failures additionally go to the configured admins.
            recipients.extend(
                Recipient::parse_list(&self.config.global.admin_recipients).unwrap_or_default(),
            );
        }

        if let Err(e) = self.notifier.send(&recipients, &summary) {
            warn!(error = %e, "notification delivery failed");
        }
        summary
    }
}

/// Default destination, derived from `source_path`: relative to the
/// incoming directory when the file came from there, the relative path
/// itself for archive entries, or the bare file name as a last resort.
fn default_dest_path(file: &PipelineFile, incoming_dir: &Path) -> String {
    let source = file.source_path();
    if let Ok(stripped) = source.strip_prefix(incoming_dir) {
        return stripped.to_string_lossy().to_string();
    }
    if source.is_absolute() {
        return file.name();
    }
    source.to_string_lossy().to_string()
}
