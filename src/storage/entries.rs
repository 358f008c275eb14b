//! Staged and committed entry rows.
//!
//! Staging holds one row per (branch, path); a write replaces whatever was
//! staged before. Committed rows are keyed by (branch, path, commit id) and
//! never change once written. Tombstones are ordinary rows with
//! `is_tombstone = 1` that hide older rows of the same path.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::storage::branches::LineageSegment;
use crate::storage::errors::StorageResult;
use crate::storage::types::{BranchId, CommitId, Metadata, RepositoryId};
use crate::transaction::Tx;

/// an entry as persisted, live or tombstone
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntryRow {
    pub path: String,
    pub physical_address: String,
    pub checksum: String,
    pub size: i64,
    pub metadata: Metadata,
    pub creation_date: DateTime<Utc>,
    pub is_tombstone: bool,
}

impl EntryRow {
    /// a deletion marker for `path`
    pub fn tombstone(path: impl Into<String>, creation_date: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            physical_address: String::new(),
            checksum: String::new(),
            size: 0,
            metadata: Metadata::new(),
            creation_date,
            is_tombstone: true,
        }
    }
}

const COLUMNS: &str =
    "path, physical_address, checksum, size, metadata, creation_date, is_tombstone";

type RawRow = (String, String, String, i64, String, DateTime<Utc>, bool);

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode(raw: RawRow) -> StorageResult<EntryRow> {
    let (path, physical_address, checksum, size, metadata, creation_date, is_tombstone) = raw;
    Ok(EntryRow {
        path,
        physical_address,
        checksum,
        size,
        metadata: serde_json::from_str(&metadata)?,
        creation_date,
        is_tombstone,
    })
}

// ==================== Staging ====================

/// stage a row, replacing any staged row for the same path
pub(crate) fn upsert_staged(tx: &Tx<'_>, branch: BranchId, entry: &EntryRow) -> StorageResult<()> {
    let metadata = serde_json::to_string(&entry.metadata)?;
    tx.sql()
        .prepare_cached(
            "INSERT INTO staged_entries(branch_id, path, physical_address, checksum, size,
                                        metadata, creation_date, is_tombstone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(branch_id, path) DO UPDATE SET
                physical_address = excluded.physical_address,
                checksum = excluded.checksum,
                size = excluded.size,
                metadata = excluded.metadata,
                creation_date = excluded.creation_date,
                is_tombstone = excluded.is_tombstone",
        )?
        .execute(params![
            branch,
            entry.path,
            entry.physical_address,
            entry.checksum,
            entry.size,
            metadata,
            entry.creation_date,
            entry.is_tombstone
        ])?;
    Ok(())
}

/// drop the staged row for a path. returns whether one existed.
pub(crate) fn remove_staged(tx: &Tx<'_>, branch: BranchId, path: &str) -> StorageResult<bool> {
    let removed = tx.sql().execute(
        "DELETE FROM staged_entries WHERE branch_id = ?1 AND path = ?2",
        params![branch, path],
    )?;
    Ok(removed > 0)
}

/// the staged row for a path, tombstone or live
pub(crate) fn get_staged(tx: &Tx<'_>, branch: BranchId, path: &str) -> StorageResult<Option<EntryRow>> {
    let sql = format!(
        "SELECT {} FROM staged_entries WHERE branch_id = ?1 AND path = ?2",
        COLUMNS
    );
    let raw = tx
        .sql()
        .prepare_cached(&sql)?
        .query_row(params![branch, path], raw_row)
        .optional()?;
    raw.map(decode).transpose()
}

/// number of staged rows on a branch
pub(crate) fn count_staged(tx: &Tx<'_>, branch: BranchId) -> StorageResult<usize> {
    let count: i64 = tx.sql().query_row(
        "SELECT COUNT(*) FROM staged_entries WHERE branch_id = ?1",
        params![branch],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Move every staged row of `branch` into committed history at `commit_id`.
///
/// Returns the number of rows folded. Staging is empty afterwards.
pub(crate) fn fold_staged(tx: &Tx<'_>, branch: BranchId, commit_id: CommitId) -> StorageResult<usize> {
    let folded = tx.sql().execute(
        "INSERT INTO committed_entries(branch_id, path, commit_id, physical_address, checksum,
                                       size, metadata, creation_date, is_tombstone)
         SELECT branch_id, path, ?2, physical_address, checksum,
                size, metadata, creation_date, is_tombstone
         FROM staged_entries
         WHERE branch_id = ?1",
        params![branch, commit_id],
    )?;
    tx.sql()
        .execute("DELETE FROM staged_entries WHERE branch_id = ?1", params![branch])?;
    Ok(folded)
}

// ==================== Committed ====================

/// The effective committed row for a path along a lineage.
///
/// Segments are searched in order and the first one holding any row for
/// the path decides, including when that row is a tombstone.
pub(crate) fn get_committed(
    tx: &Tx<'_>,
    lineage: &[LineageSegment],
    path: &str,
) -> StorageResult<Option<EntryRow>> {
    let sql = format!(
        "SELECT {} FROM committed_entries
         WHERE branch_id = ?1 AND path = ?2 AND commit_id <= ?3
         ORDER BY commit_id DESC
         LIMIT 1",
        COLUMNS
    );
    let mut stmt = tx.sql().prepare_cached(&sql)?;
    for segment in lineage {
        let raw = stmt
            .query_row(params![segment.branch, path, segment.bound], raw_row)
            .optional()?;
        if let Some(raw) = raw {
            return decode(raw).map(Some);
        }
    }
    Ok(None)
}

/// Bounds for one page of a listing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageBounds<'a> {
    pub prefix: &'a str,
    pub after: &'a str,
    pub limit: usize,
}

impl PageBounds<'_> {
    fn prefix_len(&self) -> i64 {
        self.prefix.chars().count() as i64
    }
}

/// one page of staged rows (tombstones included), in path order
pub(crate) fn page_staged(
    tx: &Tx<'_>,
    branch: BranchId,
    bounds: PageBounds<'_>,
) -> StorageResult<Vec<EntryRow>> {
    let sql = format!(
        "SELECT {} FROM staged_entries
         WHERE branch_id = ?1 AND path > ?2 AND path >= ?3 AND substr(path, 1, ?4) = ?3
         ORDER BY path
         LIMIT ?5",
        COLUMNS
    );
    let mut stmt = tx.sql().prepare_cached(&sql)?;
    let raws = stmt
        .query_map(
            params![branch, bounds.after, bounds.prefix, bounds.prefix_len(), bounds.limit as i64],
            raw_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(decode).collect()
}

/// One page of a lineage segment's effective rows (tombstones included),
/// in path order. For every path only the newest row within the bound is
/// returned.
pub(crate) fn page_committed(
    tx: &Tx<'_>,
    segment: LineageSegment,
    bounds: PageBounds<'_>,
) -> StorageResult<Vec<EntryRow>> {
    let sql = format!(
        "SELECT {} FROM committed_entries e
         WHERE e.branch_id = ?1 AND e.path > ?2 AND e.path >= ?3 AND substr(e.path, 1, ?4) = ?3
           AND e.commit_id = (
               SELECT MAX(x.commit_id) FROM committed_entries x
               WHERE x.branch_id = e.branch_id AND x.path = e.path AND x.commit_id <= ?5
           )
         ORDER BY e.path
         LIMIT ?6",
        COLUMNS
    );
    let mut stmt = tx.sql().prepare_cached(&sql)?;
    let raws = stmt
        .query_map(
            params![
                segment.branch,
                bounds.after,
                bounds.prefix,
                bounds.prefix_len(),
                segment.bound,
                bounds.limit as i64
            ],
            raw_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(decode).collect()
}

// ==================== Dedup ====================

/// the physical address recorded for a dedup id
pub(crate) fn find_dedup(
    tx: &Tx<'_>,
    repository: RepositoryId,
    dedup_id: &str,
) -> StorageResult<Option<String>> {
    let address = tx
        .sql()
        .query_row(
            "SELECT physical_address FROM object_dedup WHERE repository_id = ?1 AND dedup_id = ?2",
            params![repository, dedup_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(address)
}

/// record the physical address for a dedup id
pub(crate) fn insert_dedup(
    tx: &Tx<'_>,
    repository: RepositoryId,
    dedup_id: &str,
    physical_address: &str,
) -> StorageResult<()> {
    tx.sql().execute(
        "INSERT INTO object_dedup(repository_id, dedup_id, physical_address) VALUES (?1, ?2, ?3)",
        params![repository, dedup_id, physical_address],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::CatalogerConfig;
    use crate::storage::{branches, repositories, Store};
    use crate::transaction::Context;

    fn live(path: &str, checksum: &str) -> EntryRow {
        EntryRow {
            path: path.to_string(),
            physical_address: format!("/addr/{}", path),
            checksum: checksum.to_string(),
            size: 1,
            metadata: Metadata::new(),
            creation_date: Utc::now(),
            is_tombstone: false,
        }
    }

    fn with_branch<F>(f: F)
    where
        F: FnOnce(&Tx<'_>, RepositoryId, BranchId) -> StorageResult<()>,
    {
        let store = Store::open(&CatalogerConfig::in_memory()).unwrap();
        store
            .write(&Context::background(), "test", |tx| {
                let repo = repositories::insert(tx, "repo", "mem://", "main", Utc::now())?.unwrap();
                let branch = branches::insert(tx, repo, "main", None)?.unwrap();
                f(tx, repo, branch)
            })
            .unwrap();
    }

    fn paths(rows: &[EntryRow]) -> Vec<&str> {
        rows.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn test_staging_overwrites() {
        with_branch(|tx, _, branch| {
            upsert_staged(tx, branch, &live("a", "1"))?;
            upsert_staged(tx, branch, &live("a", "2"))?;
            assert_eq!(count_staged(tx, branch)?, 1);
            assert_eq!(get_staged(tx, branch, "a")?.unwrap().checksum, "2");

            upsert_staged(tx, branch, &EntryRow::tombstone("a", Utc::now()))?;
            assert!(get_staged(tx, branch, "a")?.unwrap().is_tombstone);

            assert!(remove_staged(tx, branch, "a")?);
            assert!(!remove_staged(tx, branch, "a")?);
            Ok(())
        });
    }

    #[test]
    fn test_fold_and_point_lookup() {
        with_branch(|tx, _, branch| {
            upsert_staged(tx, branch, &live("a", "1"))?;
            assert_eq!(fold_staged(tx, branch, CommitId::from_raw(2))?, 1);
            assert_eq!(count_staged(tx, branch)?, 0);

            upsert_staged(tx, branch, &EntryRow::tombstone("a", Utc::now()))?;
            fold_staged(tx, branch, CommitId::from_raw(3))?;

            let at2 = [LineageSegment { branch, bound: CommitId::from_raw(2) }];
            let at3 = [LineageSegment { branch, bound: CommitId::from_raw(3) }];
            assert_eq!(get_committed(tx, &at2, "a")?.unwrap().checksum, "1");
            assert!(get_committed(tx, &at3, "a")?.unwrap().is_tombstone);
            assert!(get_committed(tx, &at3, "b")?.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_pages_honor_prefix_and_cursor() {
        with_branch(|tx, _, branch| {
            for path in ["a/1", "a/2", "ab", "b/1"] {
                upsert_staged(tx, branch, &live(path, "s"))?;
            }
            let rows = page_staged(tx, branch, PageBounds { prefix: "a/", after: "", limit: 10 })?;
            assert_eq!(paths(&rows), vec!["a/1", "a/2"]);

            let rows = page_staged(tx, branch, PageBounds { prefix: "", after: "a/2", limit: 1 })?;
            assert_eq!(paths(&rows), vec!["ab"]);

            fold_staged(tx, branch, CommitId::from_raw(1))?;
            upsert_staged(tx, branch, &live("a/1", "new"))?;
            fold_staged(tx, branch, CommitId::from_raw(2))?;

            let segment = LineageSegment { branch, bound: CommitId::from_raw(1) };
            let rows = page_committed(tx, segment, PageBounds { prefix: "a", after: "", limit: 10 })?;
            assert_eq!(paths(&rows), vec!["a/1", "a/2", "ab"]);
            assert_eq!(rows[0].checksum, "s");

            let segment = LineageSegment { branch, bound: CommitId::from_raw(2) };
            let rows = page_committed(tx, segment, PageBounds { prefix: "a/1", after: "", limit: 10 })?;
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].checksum, "new");
            Ok(())
        });
    }

    #[test]
    fn test_dedup_records() {
        with_branch(|tx, repo, _| {
            assert!(find_dedup(tx, repo, "d1")?.is_none());
            insert_dedup(tx, repo, "d1", "/addr/first")?;
            assert_eq!(find_dedup(tx, repo, "d1")?.as_deref(), Some("/addr/first"));
            Ok(())
        });
    }
}
