use crate::domain::FailureCategory;
use crate::validation::is_count_parameter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Multiplies one numeric parameter on every retry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Relaxation {
    pub parameter: String,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RestartPolicyConfig {
    pub max_attempts: u32,
    pub recoverable_categories: BTreeSet<FailureCategory>,
    pub retry_on_cancellation: bool,
    pub relaxations: Vec<Relaxation>,
}

impl Default for RestartPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            recoverable_categories: BTreeSet::from([
                FailureCategory::RetrievalMissing,
                FailureCategory::RetrievalUnreadable,
                FailureCategory::OutputIncomplete,
            ]),
            retry_on_cancellation: false,
            relaxations: Vec::new(),
        }
    }
}

impl RestartPolicyConfig {
    pub fn is_recoverable(&self, category: FailureCategory) -> bool {
        !category.is_never_recoverable() && self.recoverable_categories.contains(&category)
    }

    pub fn validate(&self) -> Result<(), RestartPolicyConfigError> {
        if self.max_attempts == 0 {
            return Err(RestartPolicyConfigError::invalid(
                "maxAttempts must be at least 1",
            ));
        }

        let forbidden = self
            .recoverable_categories
            .iter()
            .filter(|category| category.is_never_recoverable())
            .map(|category| category.as_str())
            .collect::<Vec<_>>();
        if !forbidden.is_empty() {
            return Err(RestartPolicyConfigError::invalid(format!(
                "recoverableCategories may not contain {}",
                forbidden.join(", ")
            )));
        }

        for relaxation in &self.relaxations {
            if relaxation.parameter.trim().is_empty() {
                return Err(RestartPolicyConfigError::invalid(
                    "relaxation parameter name is empty",
                ));
            }
            if is_count_parameter(&relaxation.parameter) {
                return Err(RestartPolicyConfigError::invalid(format!(
                    "relaxation may not target integer count '{}'",
                    relaxation.parameter
                )));
            }
            if !relaxation.factor.is_finite() || relaxation.factor <= 0.0 {
                return Err(RestartPolicyConfigError::invalid(format!(
                    "relaxation factor for '{}' must be a positive finite number, got {}",
                    relaxation.parameter, relaxation.factor
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RestartPolicyConfigError {
    #[error("failed to read restart policy config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse restart policy config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid restart policy config: {reason}")]
    Invalid { reason: String },
}

impl RestartPolicyConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

pub fn parse_restart_policy_config(
    source: &str,
    origin: &Path,
) -> Result<RestartPolicyConfig, RestartPolicyConfigError> {
    let config: RestartPolicyConfig =
        serde_json::from_str(source).map_err(|source| RestartPolicyConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}

pub fn load_restart_policy_config(
    config_path: impl AsRef<Path>,
) -> Result<RestartPolicyConfig, RestartPolicyConfigError> {
    let config_path = config_path.as_ref();
    let source =
        fs::read_to_string(config_path).map_err(|source| RestartPolicyConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
    parse_restart_policy_config(&source, config_path)
}
