//! Command-line surface and top-level orchestration: scan -> analyze -> execute.

use crate::action::ActionExecutor;
use crate::analysis::analyze;
use crate::config::{self, RuleConfig};
use crate::error::HygieneError;
use crate::index::MetadataIndex;
use crate::scanner::scan_directory;
use crate::utils::setup_logging;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "storhy", version, about = "Find and quarantine duplicate, oversize, and stale files")]
pub struct Cli {
    /// Directories to scan. At least one must resolve to an existing directory.
    #[arg(required = true)]
    pub targets: Vec<PathBuf>,

    /// Path to a YAML rule configuration file. Defaults to built-in all-rules-disabled config.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the metadata index database file.
    #[arg(long, default_value = "./.storhy_index.sqlite3")]
    pub db_path: PathBuf,

    /// Force dry-run regardless of the config file's `action.dry_run` setting.
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug-level logging for this crate.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the full pipeline for an already-parsed [`Cli`]. Split out from `main` so integration
/// tests can drive it without spawning a process.
pub fn run(cli: &Cli) -> Result<()> {
    setup_logging(cli.verbose);

    let valid_targets: Vec<PathBuf> = cli
        .targets
        .iter()
        .filter(|t| t.is_dir())
        .cloned()
        .collect();
    if valid_targets.is_empty() {
        return Err(HygieneError::InvalidTarget(cli.targets.clone()).into());
    }

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RuleConfig::default(),
    };

    let index = MetadataIndex::open(&cli.db_path).context("opening metadata index")?;

    for target in &valid_targets {
        info!("scanning {}", target.display());
        let stats = scan_directory(target, &index)?;
        info!(
            "{}: {} scanned, {} skipped, {} errors",
            target.display(),
            stats.scanned,
            stats.skipped,
            stats.errors
        );
    }

    let actions = analyze(&index, &config)?;
    let total_candidates: usize = actions.values().map(|v| v.len()).sum();
    info!("analysis found {} candidate(s)", total_candidates);

    let mut executor = ActionExecutor::new();
    let report = executor.execute(&actions, &index, &config, Some(cli.dry_run))?;
    if report.dry_run {
        info!("dry run: {} candidate(s) would move", report.outcomes.len());
    } else {
        info!("{} file(s) moved into {}", report.applied_count(), config.staging_dir.display());
    }

    index.close().context("closing metadata index")?;
    Ok(())
}
