//! Configuration loading and validation: a YAML file maps onto [`RuleConfig`] via serde, with
//! documented defaults for everything except the values the rules are allowed to warn and skip
//! on (`min_size_mb`, `max_days`).

use crate::error::HygieneError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Validated, ready-to-use rule configuration.
#[derive(Clone, Debug)]
pub struct RuleConfig {
    pub duplicate_files_enabled: bool,
    pub large_files_enabled: bool,
    pub large_files_min_size_mb: Option<f64>,
    pub old_files_enabled: bool,
    pub old_files_max_days: Option<i64>,
    pub staging_dir: PathBuf,
    pub dry_run: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            duplicate_files_enabled: false,
            large_files_enabled: false,
            large_files_min_size_mb: None,
            old_files_enabled: false,
            old_files_max_days: None,
            staging_dir: PathBuf::from("./.storhy_staging"),
            dry_run: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    analysis: RawAnalysis,
    action: Option<RawAction>,
    action_executor: Option<RawAction>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    rules: RawRules,
}

#[derive(Debug, Default, Deserialize)]
struct RawRules {
    duplicate_files: Option<RawDuplicateRule>,
    large_files: Option<RawLargeFileRule>,
    old_files: Option<RawOldFileRule>,
}

#[derive(Debug, Deserialize)]
struct RawDuplicateRule {
    #[serde(default)]
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct RawLargeFileRule {
    #[serde(default)]
    enabled: bool,
    min_size_mb: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawOldFileRule {
    #[serde(default)]
    enabled: bool,
    max_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    staging_dir: Option<PathBuf>,
    #[serde(default)]
    dry_run: bool,
}

/// Load and validate a `RuleConfig` from a YAML file at `path`. Missing file or malformed
/// mapping is a `ConfigurationError`, fatal at startup.
pub fn load_config(path: &Path) -> Result<RuleConfig, HygieneError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        HygieneError::Configuration(format!("cannot read config file {}: {e}", path.display()))
    })?;
    parse_config(&text)
}

/// Parse already-read YAML text into a [`RuleConfig`]. Split out from [`load_config`] so tests
/// can exercise validation without touching the filesystem.
pub fn parse_config(text: &str) -> Result<RuleConfig, HygieneError> {
    let raw: RawConfig = serde_yaml::from_str(text)
        .map_err(|e| HygieneError::Configuration(format!("malformed config: {e}")))?;

    let mut cfg = RuleConfig::default();

    if let Some(dup) = raw.analysis.rules.duplicate_files {
        cfg.duplicate_files_enabled = dup.enabled;
    }
    if let Some(large) = raw.analysis.rules.large_files {
        cfg.large_files_enabled = large.enabled;
        cfg.large_files_min_size_mb = large.min_size_mb;
    }
    if let Some(old) = raw.analysis.rules.old_files {
        cfg.old_files_enabled = old.enabled;
        cfg.old_files_max_days = old.max_days;
    }

    let action = raw.action.or(raw.action_executor);
    if let Some(action) = action {
        if let Some(dir) = action.staging_dir {
            cfg.staging_dir = dir;
        }
        cfg.dry_run = action.dry_run;
    }

    Ok(cfg)
}
