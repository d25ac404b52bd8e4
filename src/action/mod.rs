//! Action Executor: moves files the Analysis Engine flagged into a staging tree, without
//! deleting anything, and keeps the Index's paths in sync.

use crate::config::RuleConfig;
use crate::error::HygieneError;
use crate::index::MetadataIndex;
use crate::types::{ActionCandidate, ActionKind};
use crate::utils::paths::normalize_for_compare;
use indexmap::IndexMap;
use log::{error, warn};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One applied or skipped candidate, for reporting back to the CLI summary.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub candidate_path: PathBuf,
    pub destination: PathBuf,
    pub applied: bool,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub dry_run: bool,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.applied).count()
    }
}

/// Stateful across a single run: tracks which source paths have already had an action applied
/// so a file that happens to match more than one rule is only ever moved once, following the
/// kind order the candidates arrive in.
#[derive(Default)]
pub struct ActionExecutor {
    moved_paths: HashSet<String>,
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply (or simulate) every candidate in `actions`, kind by kind, in the map's insertion
    /// order and candidate list order. `dry_run_override` takes precedence over
    /// `config.dry_run` when set (the CLI's `--dry-run` flag over the config file default).
    ///
    /// Returns `Err` only on an unrecoverable filesystem error, at which point `ActionExecutor`
    /// has already applied every prior candidate and those moves are not rolled back.
    pub fn execute(
        &mut self,
        actions: &IndexMap<ActionKind, Vec<ActionCandidate>>,
        index: &MetadataIndex,
        config: &RuleConfig,
        dry_run_override: Option<bool>,
    ) -> Result<ExecutionReport, HygieneError> {
        let dry_run = dry_run_override.unwrap_or(config.dry_run);
        let mut report = ExecutionReport {
            dry_run,
            outcomes: Vec::new(),
        };

        for (_kind, candidates) in actions {
            for candidate in candidates {
                let key = normalize_for_compare(&candidate.path);
                if self.moved_paths.contains(&key) {
                    continue;
                }

                if !candidate.path.exists() {
                    warn!(
                        "candidate {} no longer exists, skipping",
                        candidate.path.display()
                    );
                    continue;
                }

                let destination = staging_path(config, candidate);

                if dry_run {
                    report.outcomes.push(ActionOutcome {
                        candidate_path: candidate.path.clone(),
                        destination,
                        applied: false,
                        detail: "dry run".to_string(),
                    });
                    self.moved_paths.insert(key);
                    continue;
                }

                if destination.exists() {
                    warn!(
                        "destination {} already exists, skipping {}",
                        destination.display(),
                        candidate.path.display()
                    );
                    report.outcomes.push(ActionOutcome {
                        candidate_path: candidate.path.clone(),
                        destination,
                        applied: false,
                        detail: "destination already occupied".to_string(),
                    });
                    continue;
                }

                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent).map_err(|source| HygieneError::ActionFilesystem {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }

                move_file(&candidate.path, &destination).map_err(|source| {
                    HygieneError::ActionFilesystem {
                        path: candidate.path.clone(),
                        source,
                    }
                })?;

                self.moved_paths.insert(key);

                if let Err(e) = index.update_path(&candidate.path, &destination) {
                    error!(
                        "moved {} to {} but failed to update index: {}",
                        candidate.path.display(),
                        destination.display(),
                        e
                    );
                }

                report.outcomes.push(ActionOutcome {
                    candidate_path: candidate.path.clone(),
                    destination,
                    applied: true,
                    detail: "moved".to_string(),
                });
            }
        }

        Ok(report)
    }
}

/// `rename` first; if that fails (most commonly `EXDEV`, moving across filesystems/mounts), fall
/// back to copy-then-remove so staging directories can live on a different volume than the scan
/// target. A copy failure surfaces its own (more specific) error instead of the original
/// rename's.
fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}

/// Destination for a candidate: `duplicates/<hash[0:2]>/<hash>/<basename>` for duplicates (so a
/// large duplicate set doesn't pile thousands of files into one directory), flat
/// `<kind>/<basename>` for the review kinds.
fn staging_path(config: &RuleConfig, candidate: &ActionCandidate) -> PathBuf {
    let basename = candidate
        .path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();

    match candidate.kind {
        ActionKind::StageDuplicate => {
            let hash = candidate.hash.as_deref().unwrap_or("unknown");
            let shard = &hash[..hash.len().min(2)];
            config
                .staging_dir
                .join(candidate.kind.staging_subdir())
                .join(shard)
                .join(hash)
                .join(basename)
        }
        ActionKind::ReviewLarge | ActionKind::ReviewOld => config
            .staging_dir
            .join(candidate.kind.staging_subdir())
            .join(basename),
    }
}
