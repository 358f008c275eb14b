//! Relational schema for the catalog.
//!
//! Layout:
//!
//! - `repositories`: one row per repository, including the commit id counter
//! - `branches`: branch heads and lineage (source branch + source commit).
//!   deleted branches stay as rows with `deleted = 1` so their history can
//!   still be read through commit references.
//! - `commits`: the commit log, keyed by (repository, commit id)
//! - `staged_entries`: at most one pending row per (branch, path)
//! - `committed_entries`: immutable rows written at commit time, keyed by
//!   (branch, path, commit id). a tombstone row hides older rows on read.
//! - `object_dedup`: dedup id → physical address, per repository

use rusqlite::{params, Connection, OptionalExtension};

use crate::storage::errors::{StorageError, StorageResult};

/// schema version written by this build
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    storage_namespace TEXT NOT NULL,
    default_branch TEXT NOT NULL,
    next_commit_id INTEGER NOT NULL CHECK (next_commit_id > 0),
    creation_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS branches (
    id INTEGER PRIMARY KEY,
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    name TEXT NOT NULL,
    head_commit_id INTEGER,
    source_branch_id INTEGER REFERENCES branches(id),
    source_commit_id INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE UNIQUE INDEX IF NOT EXISTS branches_live_name
    ON branches(repository_id, name) WHERE deleted = 0;

CREATE TABLE IF NOT EXISTS commits (
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    commit_id INTEGER NOT NULL,
    branch_id INTEGER NOT NULL REFERENCES branches(id),
    reference TEXT NOT NULL,
    committer TEXT NOT NULL,
    message TEXT NOT NULL,
    metadata TEXT NOT NULL,
    parents TEXT NOT NULL,
    creation_date TEXT NOT NULL,
    PRIMARY KEY (repository_id, commit_id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS commits_by_branch
    ON commits(branch_id, commit_id);

CREATE TABLE IF NOT EXISTS staged_entries (
    branch_id INTEGER NOT NULL REFERENCES branches(id),
    path TEXT NOT NULL,
    physical_address TEXT NOT NULL,
    checksum TEXT NOT NULL,
    size INTEGER NOT NULL CHECK (size >= 0),
    metadata TEXT NOT NULL,
    creation_date TEXT NOT NULL,
    is_tombstone INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (branch_id, path)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS committed_entries (
    branch_id INTEGER NOT NULL REFERENCES branches(id),
    path TEXT NOT NULL,
    commit_id INTEGER NOT NULL,
    physical_address TEXT NOT NULL,
    checksum TEXT NOT NULL,
    size INTEGER NOT NULL CHECK (size >= 0),
    metadata TEXT NOT NULL,
    creation_date TEXT NOT NULL,
    is_tombstone INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (branch_id, path, commit_id)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS object_dedup (
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    dedup_id TEXT NOT NULL,
    physical_address TEXT NOT NULL,
    PRIMARY KEY (repository_id, dedup_id)
) WITHOUT ROWID;
"#;

/// Create missing tables and check the recorded schema version.
pub fn migrate(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(SCHEMA)?;

    let recorded: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match recorded {
        None => {
            conn.execute(
                "INSERT INTO schema_meta(key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
            tracing::debug!(version = SCHEMA_VERSION, "initialized catalog schema");
        }
        Some(value) => {
            let version: i64 = value.parse().map_err(|_| StorageError::CorruptedData {
                table: "schema_meta",
                reason: format!("unparsable schema version {:?}", value),
            })?;
            if version != SCHEMA_VERSION {
                return Err(StorageError::CorruptedData {
                    table: "schema_meta",
                    reason: format!(
                        "schema version {} is not supported (expected {})",
                        version, SCHEMA_VERSION
                    ),
                });
            }
            tracing::debug!(version, "catalog schema up to date");
        }
    }

    Ok(())
}
