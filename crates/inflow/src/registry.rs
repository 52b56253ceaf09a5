use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::check::CheckSuite;
use crate::error::ConfigError;
use crate::files::PipelineFile;
use crate::publish::harvest::Harvester;

/// Maps a pipeline file to its destination path under the store root.
pub type PathFunction = Arc<dyn Fn(&PipelineFile) -> String + Send + Sync>;

struct RegisteredHarvester {
    name: String,
    patterns: Vec<Regex>,
    harvester: Arc<dyn Harvester>,
}

/// Explicit registration tables for everything a deployment plugs in:
/// harvesters with their dest-path triggers, compliance suites, and named
/// path functions. Populated at startup from code against the names the
/// configuration declares; there is no implicit discovery.
#[derive(Default)]
pub struct PluginRegistry {
    harvesters: Vec<RegisteredHarvester>,
    check_suites: HashMap<String, Arc<dyn CheckSuite>>,
    path_functions: HashMap<String, PathFunction>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a harvester with the dest-path regexes that route files to
    /// it. Registration order is the match priority.
    pub fn register_harvester(
        &mut self,
        name: impl Into<String>,
        patterns: &[&str],
        harvester: Arc<dyn Harvester>,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if self.harvesters.iter().any(|h| h.name == name) {
            return Err(ConfigError::Validation {
                message: format!("harvester '{name}' registered twice"),
            });
        }

        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            compiled.push(Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: (*pattern).to_string(),
                reason: e.to_string(),
            })?);
        }

        self.harvesters.push(RegisteredHarvester {
            name,
            patterns: compiled,
            harvester,
        });
        Ok(())
    }

    /// Register a harvester whose trigger patterns come from the
    /// `harvester` config section. The implementation is code; the routing
    /// is configuration.
    pub fn register_harvester_from_config(
        &mut self,
        config: &crate::config::HarvesterConfig,
        harvester: Arc<dyn Harvester>,
    ) -> Result<(), ConfigError> {
        let name = harvester.name().to_string();
        let trigger = config
            .triggers
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::Validation {
                message: format!("no harvester trigger configured for '{name}'"),
            })?;
        let patterns: Vec<&str> = trigger.regexes.iter().map(String::as_str).collect();
        self.register_harvester(name, &patterns, harvester)
    }

    /// First registered harvester with a pattern matching the dest path.
    pub fn match_harvester(&self, dest_path: &str) -> Option<(&str, &Arc<dyn Harvester>)> {
        self.harvesters
            .iter()
            .find(|h| h.patterns.iter().any(|p| p.is_match(dest_path)))
            .map(|h| (h.name.as_str(), &h.harvester))
    }

    pub fn harvester(&self, name: &str) -> Option<&Arc<dyn Harvester>> {
        self.harvesters
            .iter()
            .find(|h| h.name == name)
            .map(|h| &h.harvester)
    }

    pub fn register_check_suite(&mut self, suite: Arc<dyn CheckSuite>) -> Result<(), ConfigError> {
        let name = suite.name().to_string();
        if self.check_suites.contains_key(&name) {
            return Err(ConfigError::Validation {
                message: format!("check suite '{name}' registered twice"),
            });
        }
        self.check_suites.insert(name, suite);
        Ok(())
    }

    pub fn check_suite(&self, name: &str) -> Option<Arc<dyn CheckSuite>> {
        self.check_suites.get(name).cloned()
    }

    pub fn register_path_function(
        &mut self,
        name: impl Into<String>,
        function: PathFunction,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if self.path_functions.contains_key(&name) {
            return Err(ConfigError::Validation {
                message: format!("path function '{name}' registered twice"),
            });
        }
        self.path_functions.insert(name, function);
        Ok(())
    }

    pub fn path_function(&self, name: &str) -> Option<PathFunction> {
        self.path_functions.get(name).cloned()
    }
}
