use std::path::Path;

use crate::config::schema::PipelineConfig;
use crate::error::ConfigError;
use crate::notify::Recipient;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<PipelineConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: PipelineConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let compiled =
        jsonschema::JSONSchema::compile(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

    let result = compiled.validate(json_value);
    if let Err(errors) = result {
        let error_messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    // Every sink URI must carry a scheme; the concrete backend is resolved
    // later by the storage factory.
    for uri in [
        &config.global.archive_uri,
        &config.global.upload_uri,
        &config.global.error_uri,
    ] {
        if !uri.contains("://") {
            return Err(ConfigError::InvalidUri {
                uri: uri.clone(),
                reason: "missing scheme".to_string(),
            });
        }
    }

    if config.global.processing_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "global.processing_dir must not be empty".to_string(),
        });
    }

    Recipient::parse_list(&config.global.admin_recipients)?;

    // Harvester trigger patterns must compile; failing at load time beats
    // failing mid-publish.
    let mut seen = std::collections::HashSet::new();
    for trigger in &config.harvester.triggers {
        if !seen.insert(&trigger.name) {
            return Err(ConfigError::Validation {
                message: format!("duplicate harvester trigger '{}'", trigger.name),
            });
        }
        for pattern in &trigger.regexes {
            regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}
