//! Branch rows and lineage resolution.
//!
//! A branch points at its HEAD commit and remembers where it was created
//! from: the source branch and the source HEAD at that moment. Reading a
//! branch at some commit walks that chain, so a new branch sees its
//! source's entries up to the fork point and nothing committed after.

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension, Row};

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{BranchId, CommitId, RepositoryId};
use crate::transaction::Tx;

/// a persisted branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BranchRow {
    pub id: BranchId,
    pub repository_id: RepositoryId,
    pub name: String,
    pub head: Option<CommitId>,
    pub source_branch: Option<BranchId>,
    pub source_commit: Option<CommitId>,
    pub deleted: bool,
}

/// One segment of a branch's read path: rows of `branch` with a commit id
/// at or below `bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineageSegment {
    pub branch: BranchId,
    pub bound: CommitId,
}

const COLUMNS: &str =
    "id, repository_id, name, head_commit_id, source_branch_id, source_commit_id, deleted";

fn from_row(row: &Row<'_>) -> rusqlite::Result<BranchRow> {
    Ok(BranchRow {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        name: row.get(2)?,
        head: row.get(3)?,
        source_branch: row.get(4)?,
        source_commit: row.get(5)?,
        deleted: row.get(6)?,
    })
}

/// Insert a branch. Returns None if a live branch with that name exists.
pub(crate) fn insert(
    tx: &Tx<'_>,
    repository: RepositoryId,
    name: &str,
    source: Option<(BranchId, Option<CommitId>)>,
) -> StorageResult<Option<BranchId>> {
    let (source_branch, source_commit) = match source {
        Some((branch, commit)) => (Some(branch), commit),
        None => (None, None),
    };

    let inserted = tx.sql().execute(
        "INSERT INTO branches(repository_id, name, source_branch_id, source_commit_id)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT DO NOTHING",
        params![repository, name, source_branch, source_commit],
    )?;

    if inserted == 0 {
        return Ok(None);
    }
    Ok(Some(BranchId(tx.sql().last_insert_rowid())))
}

/// look up a live branch by name
pub(crate) fn find_live(
    tx: &Tx<'_>,
    repository: RepositoryId,
    name: &str,
) -> StorageResult<Option<BranchRow>> {
    let sql = format!(
        "SELECT {} FROM branches WHERE repository_id = ?1 AND name = ?2 AND deleted = 0",
        COLUMNS
    );
    let row = tx
        .sql()
        .prepare_cached(&sql)?
        .query_row(params![repository, name], from_row)
        .optional()?;
    Ok(row)
}

/// look up any branch, deleted or not, by id
pub(crate) fn get(tx: &Tx<'_>, id: BranchId) -> StorageResult<Option<BranchRow>> {
    let sql = format!("SELECT {} FROM branches WHERE id = ?1", COLUMNS);
    let row = tx
        .sql()
        .prepare_cached(&sql)?
        .query_row(params![id], from_row)
        .optional()?;
    Ok(row)
}

/// List live branches whose name starts with `prefix`, in name order.
///
/// Fetches up to `limit + 1` rows so the caller can tell whether more exist.
pub(crate) fn list_live(
    tx: &Tx<'_>,
    repository: RepositoryId,
    prefix: &str,
    after: &str,
    limit: usize,
) -> StorageResult<Vec<BranchRow>> {
    let sql = format!(
        "SELECT {} FROM branches
         WHERE repository_id = ?1 AND deleted = 0
           AND name > ?2 AND substr(name, 1, ?3) = ?4
         ORDER BY name
         LIMIT ?5",
        COLUMNS
    );
    let mut stmt = tx.sql().prepare_cached(&sql)?;
    let rows = stmt
        .query_map(
            params![
                repository,
                after,
                prefix.chars().count() as i64,
                prefix,
                (limit + 1) as i64
            ],
            from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// point a branch at a new HEAD
pub(crate) fn set_head(tx: &Tx<'_>, branch: BranchId, head: CommitId) -> StorageResult<()> {
    let updated = tx.sql().execute(
        "UPDATE branches SET head_commit_id = ?2 WHERE id = ?1 AND deleted = 0",
        params![branch, head],
    )?;
    if updated != 1 {
        return Err(StorageError::CorruptedData {
            table: "branches",
            reason: format!("branch {} is missing or deleted", branch.0),
        });
    }
    Ok(())
}

/// Mark a branch deleted and drop its staging area.
///
/// Committed rows stay: commits made on the branch remain readable.
pub(crate) fn soft_delete(tx: &Tx<'_>, branch: BranchId) -> StorageResult<()> {
    tx.sql()
        .execute("UPDATE branches SET deleted = 1 WHERE id = ?1", params![branch])?;
    tx.sql()
        .execute("DELETE FROM staged_entries WHERE branch_id = ?1", params![branch])?;
    Ok(())
}

/// Resolve the read path of `branch` at commit `bound`.
///
/// The first segment is the branch itself; each following segment is the
/// source branch bounded by the commit the previous one forked from.
pub(crate) fn lineage(
    tx: &Tx<'_>,
    branch: BranchId,
    bound: CommitId,
) -> StorageResult<Vec<LineageSegment>> {
    let mut segments = vec![LineageSegment { branch, bound }];
    let mut seen = HashSet::from([branch]);
    let mut current = branch;

    loop {
        let row = get(tx, current)?.ok_or_else(|| StorageError::CorruptedData {
            table: "branches",
            reason: format!("lineage references missing branch {}", current.0),
        })?;

        let (Some(source), Some(source_commit)) = (row.source_branch, row.source_commit) else {
            break;
        };

        if !seen.insert(source) {
            return Err(StorageError::CorruptedData {
                table: "branches",
                reason: format!("lineage cycle through branch {}", source.0),
            });
        }

        segments.push(LineageSegment { branch: source, bound: source_commit });
        current = source;
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::config::CatalogerConfig;
    use crate::storage::{repositories, Store};
    use crate::transaction::Context;

    fn with_repo<F>(f: F)
    where
        F: FnOnce(&Tx<'_>, RepositoryId) -> StorageResult<()>,
    {
        let store = Store::open(&CatalogerConfig::in_memory()).unwrap();
        store
            .write(&Context::background(), "test", |tx| {
                let repo = repositories::insert(tx, "repo", "mem://", "main", Utc::now())?.unwrap();
                f(tx, repo)
            })
            .unwrap();
    }

    #[test]
    fn test_branch_lifecycle() {
        with_repo(|tx, repo| {
            let main = insert(tx, repo, "main", None)?.unwrap();
            assert!(insert(tx, repo, "main", None)?.is_none());

            set_head(tx, main, CommitId::FIRST)?;
            let row = find_live(tx, repo, "main")?.unwrap();
            assert_eq!(row.head, Some(CommitId::FIRST));

            soft_delete(tx, main)?;
            assert!(find_live(tx, repo, "main")?.is_none());
            assert!(get(tx, main)?.unwrap().deleted);
            assert!(set_head(tx, main, CommitId::FIRST).is_err());

            // the name is free again
            assert!(insert(tx, repo, "main", None)?.is_some());
            Ok(())
        });
    }

    #[test]
    fn test_lineage_walks_sources() {
        with_repo(|tx, repo| {
            let main = insert(tx, repo, "main", None)?.unwrap();
            let dev = insert(tx, repo, "dev", Some((main, Some(CommitId::from_raw(3)))))?.unwrap();
            let fix = insert(tx, repo, "fix", Some((dev, Some(CommitId::from_raw(5)))))?.unwrap();

            let segments = lineage(tx, fix, CommitId::from_raw(9))?;
            assert_eq!(
                segments,
                vec![
                    LineageSegment { branch: fix, bound: CommitId::from_raw(9) },
                    LineageSegment { branch: dev, bound: CommitId::from_raw(5) },
                    LineageSegment { branch: main, bound: CommitId::from_raw(3) },
                ]
            );
            Ok(())
        });
    }

    #[test]
    fn test_list_live_with_prefix() {
        with_repo(|tx, repo| {
            for name in ["alpha", "beta", "beta-2", "gamma"] {
                insert(tx, repo, name, None)?;
            }
            let rows = list_live(tx, repo, "beta", "", 10)?;
            let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["beta", "beta-2"]);

            let rows = list_live(tx, repo, "", "alpha", 1)?;
            assert_eq!(rows.len(), 2); // limit + 1
            assert_eq!(rows[0].name, "beta");
            Ok(())
        });
    }
}
