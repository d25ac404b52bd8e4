//! Walk -> bounded hashing worker pool -> single-writer channel into the Index.
//!
//! The walk itself stays on one thread (`walkdir`, never following symlinks); only the per-file
//! stat+hash work is distributed across a bounded worker pool sized from the available cores.
//! All workers funnel their results through one channel to a single receiver that owns the
//! `MetadataIndex` handle and performs every write serially, so concurrent hashing never implies
//! concurrent database writers.

use crate::error::HygieneError;
use crate::index::MetadataIndex;
use crate::scanner::hashing::hash_file;
use crate::types::{FileRecord, QueryCriteria};
use crate::utils::paths::{absolutize, normalize_for_compare};
use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use log::warn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use walkdir::WalkDir;

const CHANNEL_CAP: usize = 4096;
/// Stored vs. observed mtime tolerance. Filesystem timestamp precision
/// varies by platform; this absorbs that drift without masking real content changes.
const MTIME_TOLERANCE: Duration = Duration::from_secs(1);

#[derive(Default, Debug, Clone, Copy)]
pub struct ScanStats {
    pub scanned: usize,
    pub skipped: usize,
    pub errors: usize,
}

enum ScanOutcome {
    Upsert(FileRecord),
    Skipped,
    Error(PathBuf, String),
}

type ExistingMap = HashMap<String, (u64, DateTime<Utc>)>;

/// Enumerate files under `root`, skip unchanged ones against `index`, hash and upsert the rest.
/// `root` must already resolve to a directory (checked by the caller, which raises
/// `InvalidTarget` otherwise).
pub fn scan_directory(root: &Path, index: &MetadataIndex) -> Result<ScanStats, HygieneError> {
    let root = absolutize(root);

    let existing: ExistingMap = index
        .query(&QueryCriteria::default())?
        .into_iter()
        .map(|r| (normalize_for_compare(&r.path), (r.size_bytes, r.last_modified)))
        .collect();
    let existing = Arc::new(existing);

    let (path_tx, path_rx) = bounded::<PathBuf>(CHANNEL_CAP);
    let (outcome_tx, outcome_rx) = bounded::<ScanOutcome>(CHANNEL_CAP);

    let root_w = root.clone();
    let walk_handle = thread::spawn(move || {
        for entry in WalkDir::new(&root_w).follow_links(false).into_iter() {
            match entry {
                Ok(e) => {
                    // Only regular files produce records; directories, devices, sockets and
                    // empty subdirectories are ignored. `follow_links(false)` means WalkDir
                    // never descends into or reports symlink targets, so no separate check is
                    // needed to avoid symlink loops.
                    if e.file_type().is_file() && path_tx.send(e.into_path()).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!("error accessing path during scan: {}", err);
                }
            }
        }
    });

    let num_workers = rayon::current_num_threads().max(1);
    let worker_handles: Vec<_> = (0..num_workers)
        .map(|_| {
            let path_rx = path_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let existing = Arc::clone(&existing);
            thread::spawn(move || {
                while let Ok(path) = path_rx.recv() {
                    let outcome = match process_one(&path, &existing) {
                        Ok(outcome) => outcome,
                        Err(e) => ScanOutcome::Error(path, e.to_string()),
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(path_rx);
    drop(outcome_tx);

    let mut stats = ScanStats::default();
    let mut fatal: Option<HygieneError> = None;
    for outcome in outcome_rx {
        match outcome {
            ScanOutcome::Upsert(record) => match index.upsert(&record) {
                Ok(()) => stats.scanned += 1,
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            },
            ScanOutcome::Skipped => stats.skipped += 1,
            ScanOutcome::Error(path, msg) => {
                warn!("skipping {}: {}", path.display(), msg);
                stats.errors += 1;
            }
        }
    }

    let _ = walk_handle.join();
    for h in worker_handles {
        let _ = h.join();
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

/// One file observation: stat, skip-test against the existing snapshot, hash when needed, build
/// the record to upsert.
fn process_one(path: &Path, existing: &ExistingMap) -> std::io::Result<ScanOutcome> {
    let meta = std::fs::metadata(path)?;
    let size = meta.len();
    let modified: DateTime<Utc> = meta.modified()?.into();
    let key = normalize_for_compare(path);

    if let Some((old_size, old_modified)) = existing.get(&key) {
        let delta = (modified - *old_modified)
            .to_std()
            .unwrap_or_else(|_| (*old_modified - modified).to_std().unwrap_or_default());
        if *old_size == size && delta < MTIME_TOLERANCE {
            return Ok(ScanOutcome::Skipped);
        }
    }

    let hash = hash_file(path)?;
    let now = Utc::now();
    Ok(ScanOutcome::Upsert(FileRecord::new(
        path.to_path_buf(),
        size,
        modified,
        Some(hash),
        now,
    )))
}
