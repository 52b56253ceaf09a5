use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The pipeline configuration document. One instance is loaded per process
/// and shared read-only with every handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub global: GlobalConfig,
    pub logging: LoggingConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub harvester: HarvesterConfig,
    pub templating: TemplatingConfig,
    pub watch: WatchConfig,
    #[serde(default)]
    pub pluggable: PluggableConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Recipients for system-error notifications.
    pub admin_recipients: Vec<String>,
    pub archive_uri: String,
    pub upload_uri: String,
    /// Failed inputs are moved here for operator inspection.
    pub error_uri: String,
    /// Scratch directories are created beneath this directory.
    pub processing_dir: PathBuf,
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
    #[serde(default)]
    pub wfs_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Level for third-party libraries; defaults to `warn`.
    #[serde(default)]
    pub lib_level: Option<String>,
    #[serde(default)]
    pub pipeline_format: Option<String>,
    #[serde(default)]
    pub log_root: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub subject: String,
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
}

fn default_smtp_port() -> u16 {
    25
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvesterConfig {
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
    #[serde(default)]
    pub schema_base_dir: Option<PathBuf>,
    /// Routing table: dest-path regexes per harvester name. The named
    /// harvesters must be registered in the plugin registry at startup.
    #[serde(default)]
    pub triggers: Vec<HarvesterTrigger>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvesterTrigger {
    pub name: String,
    pub regexes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatingConfig {
    pub html_notification_template: String,
    pub text_notification_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub incoming_dir: PathBuf,
    pub task_namespace: String,
}

/// Names the deployment promises to register at startup. Purely
/// declarative: registration itself is explicit code, not discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluggableConfig {
    #[serde(default)]
    pub handlers: Vec<String>,
    #[serde(default)]
    pub path_functions: Vec<String>,
    #[serde(default)]
    pub module_versions: Vec<String>,
}
