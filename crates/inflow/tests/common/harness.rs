//! Test harness for isolated handler execution.
//!
//! Provides a complete environment per test: temporary incoming, store,
//! archive, error and processing directories, a ready-made pipeline config
//! pointing at them, and constructors for handler runners wired to local
//! sink brokers.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use zip::write::FileOptions;

use inflow::config::{
    GlobalConfig, HarvesterConfig, LoggingConfig, MailConfig, PipelineConfig, PluggableConfig,
    TemplatingConfig, WatchConfig,
};
use inflow::{
    HandlerRunner, LocalBroker, PluginRegistry, RetryPolicy, Sinks, StorageBroker,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub incoming_dir: PathBuf,
    pub store_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub error_dir: PathBuf,
    pub processing_dir: PathBuf,
    pub config: Arc<PipelineConfig>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let incoming_dir = base.join("incoming");
        let store_dir = base.join("store");
        let archive_dir = base.join("archive");
        let error_dir = base.join("error");
        let processing_dir = base.join("processing");

        for dir in [
            &incoming_dir,
            &store_dir,
            &archive_dir,
            &error_dir,
            &processing_dir,
        ] {
            std::fs::create_dir_all(dir).expect("Failed to create harness dir");
        }

        let config = Arc::new(PipelineConfig {
            global: GlobalConfig {
                admin_recipients: vec!["admin@example.org".to_string()],
                archive_uri: format!("file://{}", archive_dir.display()),
                upload_uri: format!("file://{}", store_dir.display()),
                error_uri: format!("file://{}", error_dir.display()),
                processing_dir: processing_dir.clone(),
                tmp_dir: None,
                wfs_url: None,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                lib_level: None,
                pipeline_format: None,
                log_root: None,
            },
            mail: MailConfig {
                from: "pipeline@example.org".to_string(),
                subject: "ingestion report".to_string(),
                smtp_server: "smtp.example.org".to_string(),
                smtp_port: 25,
                smtp_user: None,
                smtp_pass: None,
            },
            harvester: HarvesterConfig::default(),
            templating: TemplatingConfig {
                html_notification_template: "notify.html.j2".to_string(),
                text_notification_template: "notify.txt.j2".to_string(),
            },
            watch: WatchConfig {
                incoming_dir: incoming_dir.clone(),
                task_namespace: "tasks".to_string(),
            },
            pluggable: PluggableConfig::default(),
        });

        Self {
            temp_dir,
            incoming_dir,
            store_dir,
            archive_dir,
            error_dir,
            processing_dir,
            config,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Sinks backed by the harness's local directories.
    pub fn sinks(&self) -> Sinks {
        Sinks {
            store: Arc::new(LocalBroker::new(&self.store_dir)),
            archive: Arc::new(LocalBroker::new(&self.archive_dir)),
            error: Some(Arc::new(LocalBroker::new(&self.error_dir))),
        }
    }

    /// Sinks with a caller-supplied store broker (for fault injection).
    pub fn sinks_with_store(&self, store: Arc<dyn StorageBroker>) -> Sinks {
        Sinks {
            store,
            archive: Arc::new(LocalBroker::new(&self.archive_dir)),
            error: Some(Arc::new(LocalBroker::new(&self.error_dir))),
        }
    }

    pub fn store_broker(&self) -> LocalBroker {
        LocalBroker::new(&self.store_dir)
    }

    /// Write a test input file to the incoming directory.
    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.incoming_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    /// Write a zip input with the given entries to the incoming directory.
    pub fn write_zip(&self, filename: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.incoming_dir.join(filename);
        let file = std::fs::File::create(&path).expect("Failed to create zip");
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, FileOptions::default())
                .expect("Failed to start zip entry");
            writer.write_all(content).expect("Failed to write zip entry");
        }
        writer.finish().expect("Failed to finish zip");
        path
    }

    /// Write a simple manifest listing the given incoming-relative files.
    pub fn write_manifest(&self, filename: &str, entries: &[&str]) -> PathBuf {
        let lines: Vec<String> = entries
            .iter()
            .map(|e| self.incoming_dir.join(e).display().to_string())
            .collect();
        self.write_input(filename, format!("{}\n", lines.join("\n")).as_bytes())
    }

    /// A handler runner wired to this harness's config and sinks, with
    /// retries disabled for test speed.
    pub fn runner(&self, input: &Path, registry: Arc<PluginRegistry>) -> HandlerRunner {
        HandlerRunner::new(input, self.config.clone(), registry, self.sinks())
            .with_retry_policy(RetryPolicy::none())
    }

    pub fn runner_with_sinks(
        &self,
        input: &Path,
        registry: Arc<PluginRegistry>,
        sinks: Sinks,
    ) -> HandlerRunner {
        HandlerRunner::new(input, self.config.clone(), registry, sinks)
            .with_retry_policy(RetryPolicy::none())
    }

    pub fn assert_stored(&self, relative_path: &str) {
        let path = self.store_dir.join(relative_path);
        assert!(path.exists(), "Expected stored file missing: {:?}", path);
    }

    pub fn assert_not_stored(&self, relative_path: &str) {
        let path = self.store_dir.join(relative_path);
        assert!(!path.exists(), "Unexpected stored file present: {:?}", path);
    }

    pub fn assert_archived(&self, relative_path: &str) {
        let path = self.archive_dir.join(relative_path);
        assert!(path.exists(), "Expected archived file missing: {:?}", path);
    }

    pub fn read_store(&self, relative_path: &str) -> Vec<u8> {
        std::fs::read(self.store_dir.join(relative_path)).expect("Failed to read stored file")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A registry with one catch-all harvester registered under `recording`.
pub fn registry_with_harvester(
    harvester: Arc<dyn inflow::Harvester>,
) -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    registry
        .register_harvester("recording", &[".*"], harvester)
        .expect("Failed to register harvester");
    Arc::new(registry)
}
