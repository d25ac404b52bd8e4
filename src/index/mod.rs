//! Metadata Index: durable, transactional store for [`FileRecord`]s backed by `rusqlite`.
//!
//! One `files` table, keyed by path. Every public operation commits before returning; there is
//! no cross-call transactional batching at this layer.

use crate::error::HygieneError;
use crate::types::{FileRecord, QueryCriteria};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    last_modified TEXT NOT NULL,
    hash TEXT,
    last_scanned TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);
"#;

/// Scoped database handle: acquired at run start, released on every exit path (including the
/// error paths of the orchestrator) by calling [`MetadataIndex::close`], or implicitly when the
/// wrapped `rusqlite::Connection` is dropped.
pub struct MetadataIndex {
    conn: Option<Connection>,
}

fn path_key(path: &Path) -> String {
    crate::utils::paths::normalize_for_compare(path)
}

type RawRow = (String, String, i64, String, Option<String>, String);

fn row_to_raw(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

/// Turn a raw row into a [`FileRecord`], rejecting a stored `size_bytes` that has gone negative
/// (only reachable through external corruption of the database file; `upsert` can never write
/// one since `FileRecord::size_bytes` is unsigned).
fn raw_to_record(raw: RawRow) -> Result<FileRecord, HygieneError> {
    let (path, filename, size_bytes, last_modified, hash, last_scanned) = raw;
    if size_bytes < 0 {
        return Err(HygieneError::InvalidRecord(format!(
            "stored size_bytes for {path} is negative: {size_bytes}"
        )));
    }
    Ok(FileRecord {
        path: PathBuf::from(path),
        filename,
        size_bytes: size_bytes as u64,
        last_modified: parse_instant(&last_modified),
        hash,
        last_scanned: parse_instant(&last_scanned),
    })
}

fn parse_instant(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

impl MetadataIndex {
    /// Create the database file if absent, then ensure the `files` schema exists.
    /// `StorageUnavailable` if `db_path` is not writable or the schema can't be created.
    pub fn open(db_path: &Path) -> Result<Self, HygieneError> {
        let conn =
            Connection::open(db_path).map_err(|source| HygieneError::StorageUnavailable {
                path: db_path.to_path_buf(),
                source,
            })?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|source| HygieneError::StorageUnavailable {
                path: db_path.to_path_buf(),
                source,
            })?;
        conn.execute_batch(SCHEMA)
            .map_err(|source| HygieneError::StorageUnavailable {
                path: db_path.to_path_buf(),
                source,
            })?;
        Ok(Self { conn: Some(conn) })
    }

    /// Open an in-memory index (same schema). Used by tests and by callers that diff against an
    /// in-process snapshot without touching disk.
    pub fn open_in_memory() -> Result<Self, HygieneError> {
        let conn = Connection::open_in_memory().map_err(|source| {
            HygieneError::StorageUnavailable {
                path: PathBuf::from(":memory:"),
                source,
            }
        })?;
        conn.execute_batch(SCHEMA)
            .map_err(HygieneError::IndexWrite)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("MetadataIndex used after close()")
    }

    /// Release the underlying handle. Safe to call at most once; a second call is a logic error
    /// (the handle is already gone). Dropping without calling `close()` still releases the
    /// connection (rusqlite closes on drop), so this is for explicit, early release on error
    /// paths, not for correctness.
    pub fn close(mut self) -> Result<(), HygieneError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| HygieneError::IndexWrite(e))?;
        }
        Ok(())
    }

    /// Insert-or-replace by primary key (`path`). All fields required by [`FileRecord`]'s type;
    /// the only field that can legitimately be absent is `hash` (transiently, after a failed
    /// read), which the type models as `Option<String>`.
    pub fn upsert(&self, record: &FileRecord) -> Result<(), HygieneError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO files (path, filename, size_bytes, last_modified, hash, last_scanned)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    path_key(&record.path),
                    record.filename,
                    record.size_bytes as i64,
                    record.last_modified.to_rfc3339(),
                    record.hash,
                    record.last_scanned.to_rfc3339(),
                ],
            )
            .map_err(HygieneError::IndexWrite)?;
        Ok(())
    }

    /// Equality match on a whitelisted column subset. Empty criteria returns all records.
    pub fn query(&self, criteria: &QueryCriteria) -> Result<Vec<FileRecord>, HygieneError> {
        if criteria.is_empty() {
            let mut stmt = self
                .conn()
                .prepare(
                    "SELECT path, filename, size_bytes, last_modified, hash, last_scanned FROM files",
                )
                .map_err(HygieneError::IndexWrite)?;
            let rows = stmt
                .query_map([], row_to_raw)
                .map_err(HygieneError::IndexWrite)?;
            let raws = rows
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(HygieneError::IndexWrite)?;
            return raws.into_iter().map(raw_to_record).collect();
        }

        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(ref p) = criteria.path {
            clauses.push("path = ?");
            values.push(Box::new(path_key(p)));
        }
        if let Some(ref f) = criteria.filename {
            clauses.push("filename = ?");
            values.push(Box::new(f.clone()));
        }
        if let Some(s) = criteria.size_bytes {
            clauses.push("size_bytes = ?");
            values.push(Box::new(s as i64));
        }
        if let Some(ref lm) = criteria.last_modified {
            clauses.push("last_modified = ?");
            values.push(Box::new(lm.to_rfc3339()));
        }
        if let Some(ref h) = criteria.hash {
            clauses.push("hash = ?");
            values.push(Box::new(h.clone()));
        }
        if let Some(ref ls) = criteria.last_scanned {
            clauses.push("last_scanned = ?");
            values.push(Box::new(ls.to_rfc3339()));
        }

        let sql = format!(
            "SELECT path, filename, size_bytes, last_modified, hash, last_scanned FROM files WHERE {}",
            clauses.join(" AND ")
        );
        let mut stmt = self.conn().prepare(&sql).map_err(HygieneError::IndexWrite)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_raw)
            .map_err(HygieneError::IndexWrite)?;
        let raws = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(HygieneError::IndexWrite)?;
        raws.into_iter().map(raw_to_record).collect()
    }

    /// Hash -> records sharing that hash, omitting singleton hashes. Order within a group is
    /// unspecified; callers that need a deterministic order re-sort.
    pub fn get_duplicates(&self) -> Result<HashMap<String, Vec<FileRecord>>, HygieneError> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT path, filename, size_bytes, last_modified, hash, last_scanned
                 FROM files WHERE hash IS NOT NULL",
            )
            .map_err(HygieneError::IndexWrite)?;
        let rows = stmt
            .query_map([], row_to_raw)
            .map_err(HygieneError::IndexWrite)?;

        let mut groups: HashMap<String, Vec<FileRecord>> = HashMap::new();
        for row in rows {
            let raw = row.map_err(HygieneError::IndexWrite)?;
            let record = raw_to_record(raw)?;
            if let Some(hash) = record.hash.clone() {
                groups.entry(hash).or_default().push(record);
            }
        }
        groups.retain(|_, records| records.len() >= 2);
        Ok(groups)
    }

    /// Atomic rename of the primary key. `NotFound` if `old_path` is absent, `Conflict` if
    /// `new_path` already exists.
    pub fn update_path(&self, old_path: &Path, new_path: &Path) -> Result<(), HygieneError> {
        let old_key = path_key(old_path);
        let new_key = path_key(new_path);

        let exists_old: Option<String> = self
            .conn()
            .query_row(
                "SELECT path FROM files WHERE path = ?1",
                params![old_key],
                |r| r.get(0),
            )
            .optional()
            .map_err(HygieneError::IndexWrite)?;
        if exists_old.is_none() {
            return Err(HygieneError::NotFound(old_path.to_path_buf()));
        }

        let exists_new: Option<String> = self
            .conn()
            .query_row(
                "SELECT path FROM files WHERE path = ?1",
                params![new_key],
                |r| r.get(0),
            )
            .optional()
            .map_err(HygieneError::IndexWrite)?;
        if exists_new.is_some() {
            return Err(HygieneError::Conflict(new_path.to_path_buf()));
        }

        let new_filename = new_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.conn()
            .execute(
                "UPDATE files SET path = ?1, filename = ?2 WHERE path = ?3",
                params![new_key, new_filename, old_key],
            )
            .map_err(HygieneError::IndexWrite)?;
        Ok(())
    }
}
