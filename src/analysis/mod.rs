//! Analysis Engine: pure rule evaluation over an Index snapshot, no I/O.
//!
//! A pure function of an Index snapshot plus `RuleConfig`, with no filesystem or database access
//! of its own beyond reading through the Index. Rules run in a fixed order -- duplicates, then
//! large files, then old files -- and an `IndexMap` preserves that order into the output so the
//! Action Executor sees candidates in the same sequence they were decided, which is what its
//! at-most-one-action-per-file precedence relies on.

use crate::config::RuleConfig;
use crate::index::MetadataIndex;
use crate::types::{ActionCandidate, ActionKind};
use crate::utils::paths::absolutize;
use chrono::{Duration, Utc};
use indexmap::IndexMap;
use log::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Evaluate every enabled rule in `config` against `index`, in duplicate/large/old order.
/// Disabled rules and rules missing their required threshold are skipped (the latter with a
/// warning); kinds with no candidates are omitted from the returned map entirely.
pub fn analyze(
    index: &MetadataIndex,
    config: &RuleConfig,
) -> Result<IndexMap<ActionKind, Vec<ActionCandidate>>, crate::error::HygieneError> {
    let mut result = IndexMap::new();

    if config.duplicate_files_enabled {
        let candidates = duplicate_candidates(index, &config.staging_dir)?;
        if !candidates.is_empty() {
            result.insert(ActionKind::StageDuplicate, candidates);
        }
    }

    if config.large_files_enabled {
        match config.large_files_min_size_mb {
            Some(min_size_mb) => {
                let candidates = large_candidates(index, min_size_mb)?;
                if !candidates.is_empty() {
                    result.insert(ActionKind::ReviewLarge, candidates);
                }
            }
            None => warn!("large_files rule enabled but min_size_mb is not set; skipping"),
        }
    }

    if config.old_files_enabled {
        match config.old_files_max_days {
            Some(max_days) if max_days > 0 => {
                let candidates = old_candidates(index, max_days)?;
                if !candidates.is_empty() {
                    result.insert(ActionKind::ReviewOld, candidates);
                }
            }
            _ => warn!("old_files rule enabled but max_days is not a positive integer; skipping"),
        }
    }

    Ok(result)
}

/// Within each hash group sharing two or more files, the earliest-modified (ties broken by
/// path) is kept as the original; every other member becomes a `StageDuplicate` candidate.
///
/// Records already staged under `staging_dir` are excluded before grouping: a staged copy keeps
/// its original content (and therefore its original hash), so without this exclusion every
/// subsequent run would re-flag it as a duplicate of the file it was staged from.
fn duplicate_candidates(
    index: &MetadataIndex,
    staging_dir: &std::path::Path,
) -> Result<Vec<ActionCandidate>, crate::error::HygieneError> {
    let staging_dir = absolutize(staging_dir);
    let groups = index.get_duplicates()?;
    let mut candidates = Vec::new();

    let mut hashes: Vec<&String> = groups.keys().collect();
    hashes.sort();

    for hash in hashes {
        let mut records: Vec<_> = groups[hash]
            .iter()
            .filter(|r| !r.path.starts_with(&staging_dir))
            .cloned()
            .collect();
        if records.len() < 2 {
            continue;
        }
        records.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.path.cmp(&b.path))
        });
        let original = records[0].clone();
        for record in records.into_iter().skip(1) {
            candidates.push(ActionCandidate {
                kind: ActionKind::StageDuplicate,
                path: record.path,
                hash: record.hash,
                original_path: Some(original.path.clone()),
                reason: format!("duplicate of {}", original.path.display()),
            });
        }
    }

    Ok(candidates)
}

fn large_candidates(
    index: &MetadataIndex,
    min_size_mb: f64,
) -> Result<Vec<ActionCandidate>, crate::error::HygieneError> {
    let threshold_bytes = min_size_mb * BYTES_PER_MB;
    let mut records = index.query(&Default::default())?;
    records.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(records
        .into_iter()
        .filter(|r| r.size_bytes as f64 > threshold_bytes)
        .map(|r| ActionCandidate {
            kind: ActionKind::ReviewLarge,
            path: r.path,
            hash: r.hash,
            original_path: None,
            reason: format!(
                "{:.1} MiB exceeds {:.1} MiB threshold",
                r.size_bytes as f64 / BYTES_PER_MB,
                min_size_mb
            ),
        })
        .collect())
}

fn old_candidates(
    index: &MetadataIndex,
    max_days: i64,
) -> Result<Vec<ActionCandidate>, crate::error::HygieneError> {
    let cutoff = Utc::now() - Duration::days(max_days);
    let mut records = index.query(&Default::default())?;
    records.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(records
        .into_iter()
        .filter(|r| r.last_modified < cutoff)
        .map(|r| ActionCandidate {
            kind: ActionKind::ReviewOld,
            path: r.path,
            hash: r.hash,
            original_path: None,
            reason: format!("last modified before {} day cutoff", max_days),
        })
        .collect())
}
