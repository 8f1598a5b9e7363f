use std::path::Path;

use branchplan_core::Limits;
use branchplan_core::validation::DEFAULT_MAX_BENEFITS;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What happens to an override when its branch is dropped from the
/// template's assigned set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanOverridePolicy {
    /// Keep the override; it stays reachable by branch id.
    #[default]
    Retain,
    /// Delete it in the same save as the reassignment.
    Cascade,
}

/// How `effective_plan` treats a branch outside `assignedBranchIds`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfScopeReads {
    /// Return template values and log a warning.
    #[default]
    Allow,
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub orphan_overrides: OrphanOverridePolicy,
    pub out_of_scope_reads: OutOfScopeReads,
    /// Check target and assigned branch ids against the branch directory.
    pub verify_branches: bool,
    pub max_benefits: usize,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            orphan_overrides: OrphanOverridePolicy::default(),
            out_of_scope_reads: OutOfScopeReads::default(),
            verify_branches: false,
            max_benefits: DEFAULT_MAX_BENEFITS,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_benefits: self.max_benefits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.orphan_overrides, OrphanOverridePolicy::Retain);
        assert_eq!(config.out_of_scope_reads, OutOfScopeReads::Allow);
        assert_eq!(config.limits().max_benefits, DEFAULT_MAX_BENEFITS);
    }

    #[test]
    fn full_document_parses() {
        let config = EngineConfig::from_toml_str(
            r#"
            orphan_overrides = "cascade"
            out_of_scope_reads = "reject"
            verify_branches = true
            max_benefits = 5

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.orphan_overrides, OrphanOverridePolicy::Cascade);
        assert_eq!(config.out_of_scope_reads, OutOfScopeReads::Reject);
        assert!(config.verify_branches);
        assert_eq!(config.max_benefits, 5);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_policy_is_a_config_error() {
        let err = EngineConfig::from_toml_str(r#"orphan_overrides = "sometimes""#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "got {err:?}");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = EngineConfig::load("/nonexistent/branchplan.toml").unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("branchplan.toml")));
    }
}
