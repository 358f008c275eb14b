//! Commit log rows.
//!
//! The log is append-only: rows are inserted by the commit engine and
//! never updated afterwards.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::storage::branches::LineageSegment;
use crate::storage::errors::StorageResult;
use crate::storage::types::{BranchId, CommitId, Metadata, RepositoryId};
use crate::transaction::Tx;

/// a persisted commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommitRow {
    pub repository_id: RepositoryId,
    pub commit_id: CommitId,
    pub branch_id: BranchId,
    pub reference: String,
    pub committer: String,
    pub message: String,
    pub metadata: Metadata,
    pub parents: Vec<String>,
    pub creation_date: DateTime<Utc>,
}

const COLUMNS: &str = "repository_id, commit_id, branch_id, reference, committer, message, \
                       metadata, parents, creation_date";

/// raw columns; the JSON ones are decoded outside rusqlite's row closure
type RawRow = (RepositoryId, CommitId, BranchId, String, String, String, String, String, DateTime<Utc>);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode(raw: RawRow) -> StorageResult<CommitRow> {
    let (repository_id, commit_id, branch_id, reference, committer, message, metadata, parents, creation_date) =
        raw;
    Ok(CommitRow {
        repository_id,
        commit_id,
        branch_id,
        reference,
        committer,
        message,
        metadata: serde_json::from_str(&metadata)?,
        parents: serde_json::from_str(&parents)?,
        creation_date,
    })
}

/// append a commit to the log
pub(crate) fn insert(tx: &Tx<'_>, commit: &CommitRow) -> StorageResult<()> {
    let metadata = serde_json::to_string(&commit.metadata)?;
    let parents = serde_json::to_string(&commit.parents)?;
    tx.sql().execute(
        "INSERT INTO commits(repository_id, commit_id, branch_id, reference, committer, message,
                             metadata, parents, creation_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            commit.repository_id,
            commit.commit_id,
            commit.branch_id,
            commit.reference,
            commit.committer,
            commit.message,
            metadata,
            parents,
            commit.creation_date
        ],
    )?;
    Ok(())
}

/// look up a commit by id
pub(crate) fn get(
    tx: &Tx<'_>,
    repository: RepositoryId,
    commit_id: CommitId,
) -> StorageResult<Option<CommitRow>> {
    let sql = format!(
        "SELECT {} FROM commits WHERE repository_id = ?1 AND commit_id = ?2",
        COLUMNS
    );
    let raw = tx
        .sql()
        .prepare_cached(&sql)?
        .query_row(params![repository, commit_id], raw_row)
        .optional()?;
    raw.map(decode).transpose()
}

/// The commits a lineage segment contributes to history, newest first.
///
/// Only commits strictly below `before` (when given) are returned.
pub(crate) fn list_segment(
    tx: &Tx<'_>,
    repository: RepositoryId,
    segment: LineageSegment,
    before: Option<CommitId>,
    limit: usize,
) -> StorageResult<Vec<CommitRow>> {
    let upper = match before {
        Some(before) if before <= segment.bound => CommitId::from_raw(before.get() - 1),
        _ => segment.bound,
    };

    let sql = format!(
        "SELECT {} FROM commits
         WHERE repository_id = ?1 AND branch_id = ?2 AND commit_id <= ?3
         ORDER BY commit_id DESC
         LIMIT ?4",
        COLUMNS
    );
    let mut stmt = tx.sql().prepare_cached(&sql)?;
    let raws = stmt
        .query_map(params![repository, segment.branch, upper, limit as i64], raw_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(decode).collect()
}
