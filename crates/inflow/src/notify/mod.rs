use std::fmt::Write as _;
use std::path::PathBuf;

use tracing::info;

use crate::error::{ConfigError, ErrorKind, NotifyError};
use crate::files::{CheckState, FileCollection, PipelineFile};
use crate::handler::Disposition;

/// A typed notification recipient. The accepted forms are
/// `email:<address>` and a bare address containing `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Email(String),
}

impl Recipient {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let address = match value.split_once(':') {
            Some(("email", rest)) => rest,
            Some(_) => {
                return Err(ConfigError::InvalidRecipient {
                    value: value.to_string(),
                })
            }
            None => value,
        };
        if !address.contains('@') || address.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidRecipient {
                value: value.to_string(),
            });
        }
        Ok(Recipient::Email(address.to_string()))
    }

    pub fn parse_list(values: &[String]) -> Result<Vec<Self>, ConfigError> {
        values.iter().map(|v| Recipient::parse(v)).collect()
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::Email(address) => write!(f, "email:{address}"),
        }
    }
}

/// Per-file status line in the notification payload.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub name: String,
    pub dest_path: Option<String>,
    pub publish_type: String,
    pub check: &'static str,
    pub check_log: Vec<String>,
    pub archived: bool,
    pub harvested: bool,
    pub stored: bool,
    pub is_deletion: bool,
}

impl FileSummary {
    fn from_file(file: &PipelineFile) -> Self {
        let check = match file.check_state() {
            CheckState::NotChecked => "not checked",
            CheckState::Passed => "passed",
            CheckState::Failed(_) => "failed",
        };
        let check_log = match file.check_state() {
            CheckState::Failed(log) => log.clone(),
            _ => Vec::new(),
        };
        Self {
            name: file.name(),
            dest_path: file.dest_path().map(str::to_string),
            publish_type: file.publish().to_string(),
            check,
            check_log,
            archived: file.is_archived(),
            harvested: file.is_harvested(),
            stored: file.is_stored(),
            is_deletion: file.is_deletion(),
        }
    }
}

/// The observable state of one handler execution: what the notification
/// transport renders and delivers.
#[derive(Debug, Clone)]
pub struct NotificationSummary {
    pub handler_id: String,
    pub input_file: PathBuf,
    pub disposition: Disposition,
    pub error: Option<(ErrorKind, String)>,
    pub warnings: Vec<String>,
    pub files: Vec<FileSummary>,
}

impl NotificationSummary {
    pub fn new(
        handler_id: impl Into<String>,
        input_file: impl Into<PathBuf>,
        disposition: Disposition,
        error: Option<(ErrorKind, String)>,
        warnings: Vec<String>,
        files: &FileCollection,
    ) -> Self {
        Self {
            handler_id: handler_id.into(),
            input_file: input_file.into(),
            disposition,
            error,
            warnings,
            files: files.iter().map(FileSummary::from_file).collect(),
        }
    }

    /// Plain-text rendering used by the default notifier and as template
    /// context by real transports.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "handler: {}", self.handler_id);
        let _ = writeln!(out, "input: {}", self.input_file.display());
        let _ = writeln!(out, "disposition: {}", self.disposition);
        if let Some((kind, message)) = &self.error {
            let _ = writeln!(out, "error: [{kind}] {message}");
        }
        for warning in &self.warnings {
            let _ = writeln!(out, "warning: {warning}");
        }
        let _ = writeln!(out, "files: {}", self.files.len());
        for file in &self.files {
            let _ = writeln!(
                out,
                "  {} [{}] check={} archived={} harvested={} stored={}",
                file.name,
                file.publish_type,
                file.check,
                file.archived,
                file.harvested,
                file.stored
            );
            for line in &file.check_log {
                let _ = writeln!(out, "    {line}");
            }
        }
        out
    }
}

/// Delivery boundary. Rendering and transport are deployment concerns; the
/// runtime only guarantees that `send` is called exactly once per
/// execution, success or failure.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        recipients: &[Recipient],
        summary: &NotificationSummary,
    ) -> Result<(), NotifyError>;
}

/// Default notifier: writes the summary to the log. Useful in development
/// and as the fallback when no transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(
        &self,
        recipients: &[Recipient],
        summary: &NotificationSummary,
    ) -> Result<(), NotifyError> {
        let recipient_list = recipients
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            recipients = %recipient_list,
            "notification:\n{}",
            summary.render_text()
        );
        Ok(())
    }
}
