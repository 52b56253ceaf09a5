use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::CheckError;
use crate::files::{CheckResult, CheckType, FileCollection};

/// A named compliance suite. Implementations read the file and judge it
/// against arbitrary criteria; the runtime only cares about the
/// [`CheckResult`]. IO problems while reading are errors, non-compliance is
/// not.
pub trait CheckSuite: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, path: &Path) -> Result<CheckResult, CheckError>;
}

/// Outcome of the check phase across the whole collection.
#[derive(Debug, Default)]
pub struct CheckSummary {
    /// Names of files whose checks failed, insertion order.
    pub failed: Vec<String>,
}

impl CheckSummary {
    pub fn all_passed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn into_error(self) -> CheckError {
        CheckError::FilesFailed { names: self.failed }
    }
}

/// Dispatches each file to the validation strategy its `check_type`
/// declares and records the result on the file. Policy (fail fast or carry
/// on) is the runtime's decision, not the checker's.
pub struct Checker {
    suites: Vec<Arc<dyn CheckSuite>>,
}

impl Checker {
    pub fn new(suites: Vec<Arc<dyn CheckSuite>>) -> Self {
        Self { suites }
    }

    pub fn without_suites() -> Self {
        Self { suites: Vec::new() }
    }

    pub fn run(&self, files: &mut FileCollection) -> Result<CheckSummary, CheckError> {
        let mut summary = CheckSummary::default();

        for file in files.iter_mut() {
            let check_type = match file.check_type() {
                Some(t) => t,
                // Deletion records have nothing local to read.
                None => continue,
            };

            let path = file.local_path().to_path_buf();
            debug!(file = %file.name(), check = ?check_type, "checking");

            let result = match check_type {
                CheckType::Compliance => self.run_compliance(file.file_type().is_scientific(), &path)?,
                CheckType::Format => {
                    let compliant = file
                        .file_type()
                        .validate(&path)
                        .map_err(|e| CheckError::ReadFailure {
                            path: path.clone(),
                            source: e,
                        })?;
                    if compliant {
                        CheckResult::passed()
                    } else {
                        CheckResult::failed(vec![format!(
                            "invalid format: did not validate as type: {}",
                            file.file_type()
                        )])
                    }
                }
                CheckType::NonEmpty => {
                    let nonempty = crate::files::file_type::is_nonempty(&path).map_err(|e| {
                        CheckError::ReadFailure {
                            path: path.clone(),
                            source: e,
                        }
                    })?;
                    if nonempty {
                        CheckResult::passed()
                    } else {
                        CheckResult::failed(vec!["empty file".to_string()])
                    }
                }
            };

            if !result.compliant {
                summary.failed.push(file.name());
            }
            file.set_check_result(result);
        }

        for file in files.check_failures() {
            if let crate::files::CheckState::Failed(log) = file.check_state() {
                error!(file = %file.name(), "check failed:\n{}", log.join("\n"));
            }
        }

        Ok(summary)
    }

    /// Compliance checking first confirms the file really is the scientific
    /// format it claims to be, then runs every configured suite and
    /// concatenates their diagnostics.
    fn run_compliance(&self, is_scientific: bool, path: &Path) -> Result<CheckResult, CheckError> {
        if !is_scientific {
            return Ok(CheckResult::failed(vec![
                "compliance check requested for a non-scientific format".to_string(),
            ]));
        }

        let valid = crate::files::FileType::NetCdf
            .validate(path)
            .map_err(|e| CheckError::ReadFailure {
                path: path.to_path_buf(),
                source: e,
            })?;
        if !valid {
            return Ok(CheckResult::failed(vec!["invalid NetCDF file".to_string()]));
        }

        let mut compliant = true;
        let mut log = Vec::new();
        for suite in &self.suites {
            info!(suite = suite.name(), path = %path.display(), "running compliance suite");
            let result = suite.check(path)?;
            if !result.compliant {
                compliant = false;
                log.extend(result.log);
            }
        }

        if compliant {
            Ok(CheckResult::passed())
        } else {
            Ok(CheckResult::failed(log))
        }
    }
}
