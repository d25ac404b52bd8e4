//! Public and internal types shared across the pipeline: Index -> Analysis -> Executor.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// One record per absolute path in the index. See the `files` table schema in [`crate::index`].
#[derive(Clone, Debug, PartialEq)]
pub struct FileRecord {
    /// Absolute, normalized path. Primary key.
    pub path: PathBuf,
    /// `basename(path)`, kept in sync by every mutation.
    pub filename: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    /// Lowercase hex SHA-256 of file contents. `None` only transiently after a failed read.
    pub hash: Option<String>,
    pub last_scanned: DateTime<Utc>,
}

impl FileRecord {
    /// Build a record, deriving `filename` from `path`. Used by the Scanner on every upsert so
    /// `filename == basename(path)` never drifts (invariant I2).
    pub fn new(
        path: PathBuf,
        size_bytes: u64,
        last_modified: DateTime<Utc>,
        hash: Option<String>,
        last_scanned: DateTime<Utc>,
    ) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            filename,
            size_bytes,
            last_modified,
            hash,
            last_scanned,
        }
    }
}

/// Action kind as a tagged variant, so dispatch over it is an exhaustive match instead of a
/// string-keyed lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    StageDuplicate,
    ReviewLarge,
    ReviewOld,
}

impl ActionKind {
    /// Subdirectory of `staging_dir` this kind relocates into (the non-duplicate kinds; see
    /// `action::staging_path` for the duplicate-specific sharded layout).
    pub fn staging_subdir(self) -> &'static str {
        match self {
            ActionKind::StageDuplicate => "duplicates",
            ActionKind::ReviewLarge => "large_files",
            ActionKind::ReviewOld => "old_files",
        }
    }
}

/// A pending, not-yet-executed operation emitted by the Analysis Engine.
#[derive(Clone, Debug)]
pub struct ActionCandidate {
    pub kind: ActionKind,
    pub path: PathBuf,
    /// Required when `kind == ActionKind::StageDuplicate`.
    pub hash: Option<String>,
    /// For duplicates: path of the kept sibling.
    pub original_path: Option<PathBuf>,
    /// Human-readable explanation (diagnostic only, never parsed).
    pub reason: String,
}

/// Criteria for [`crate::index::MetadataIndex::query`]: equality on a whitelisted column subset.
/// `None` per field means "don't filter on this column"; an entirely empty criteria returns all
/// records.
#[derive(Clone, Debug, Default)]
pub struct QueryCriteria {
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
    pub size_bytes: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub hash: Option<String>,
    pub last_scanned: Option<DateTime<Utc>>,
}

impl QueryCriteria {
    pub fn is_empty(&self) -> bool {
        self.path.is_none()
            && self.filename.is_none()
            && self.size_bytes.is_none()
            && self.last_modified.is_none()
            && self.hash.is_none()
            && self.last_scanned.is_none()
    }

    pub fn by_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            ..Default::default()
        }
    }
}
