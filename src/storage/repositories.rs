//! Repository rows and the per-repository commit id counter.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::types::{CommitId, RepositoryId};
use crate::transaction::Tx;

/// a persisted repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RepositoryRow {
    pub id: RepositoryId,
    pub name: String,
    pub storage_namespace: String,
    pub default_branch: String,
    pub creation_date: DateTime<Utc>,
}

const COLUMNS: &str = "id, name, storage_namespace, default_branch, creation_date";

fn from_row(row: &Row<'_>) -> rusqlite::Result<RepositoryRow> {
    Ok(RepositoryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        storage_namespace: row.get(2)?,
        default_branch: row.get(3)?,
        creation_date: row.get(4)?,
    })
}

/// insert a repository. returns None if the name is taken.
pub(crate) fn insert(
    tx: &Tx<'_>,
    name: &str,
    storage_namespace: &str,
    default_branch: &str,
    creation_date: DateTime<Utc>,
) -> StorageResult<Option<RepositoryId>> {
    let inserted = tx.sql().execute(
        "INSERT INTO repositories(name, storage_namespace, default_branch, next_commit_id, creation_date)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(name) DO NOTHING",
        params![name, storage_namespace, default_branch, CommitId::FIRST, creation_date],
    )?;

    if inserted == 0 {
        return Ok(None);
    }
    Ok(Some(RepositoryId(tx.sql().last_insert_rowid())))
}

/// look up a repository by name
pub(crate) fn find(tx: &Tx<'_>, name: &str) -> StorageResult<Option<RepositoryRow>> {
    let sql = format!("SELECT {} FROM repositories WHERE name = ?1", COLUMNS);
    let row = tx
        .sql()
        .prepare_cached(&sql)?
        .query_row(params![name], from_row)
        .optional()?;
    Ok(row)
}

/// list repositories ordered by name
pub(crate) fn list(tx: &Tx<'_>) -> StorageResult<Vec<RepositoryRow>> {
    let sql = format!("SELECT {} FROM repositories ORDER BY name", COLUMNS);
    let mut stmt = tx.sql().prepare_cached(&sql)?;
    let rows = stmt.query_map([], from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Take the next commit id for a repository.
///
/// The counter lives in the repository row, so the update also takes the
/// row's write lock for the rest of the transaction.
pub(crate) fn allocate_commit_id(tx: &Tx<'_>, repository: RepositoryId) -> StorageResult<CommitId> {
    let next: i64 = tx
        .sql()
        .query_row(
            "UPDATE repositories SET next_commit_id = next_commit_id + 1
             WHERE id = ?1
             RETURNING next_commit_id - 1",
            params![repository],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StorageError::CorruptedData {
            table: "repositories",
            reason: format!("repository {} vanished while allocating a commit id", repository.0),
        })?;

    CommitId::new(next).ok_or_else(|| StorageError::CorruptedData {
        table: "repositories",
        reason: format!("invalid commit counter value {}", next),
    })
}

/// Ensure the counter never hands out `id` (or anything below it) again.
pub(crate) fn burn_commit_id(tx: &Tx<'_>, repository: RepositoryId, id: CommitId) -> StorageResult<()> {
    tx.sql().execute(
        "UPDATE repositories SET next_commit_id = MAX(next_commit_id, ?2) WHERE id = ?1",
        params![repository, id.next()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogerConfig;
    use crate::storage::Store;
    use crate::transaction::Context;

    fn store() -> Store {
        Store::open(&CatalogerConfig::in_memory()).unwrap()
    }

    #[test]
    fn test_insert_and_find() {
        let store = store();
        let ctx = Context::background();
        store
            .write(&ctx, "test", |tx| -> StorageResult<()> {
                let id = insert(tx, "repo", "s3://bucket", "main", Utc::now())?;
                assert!(id.is_some());
                let dup = insert(tx, "repo", "s3://other", "main", Utc::now())?;
                assert!(dup.is_none());

                let row = find(tx, "repo")?.unwrap();
                assert_eq!(row.storage_namespace, "s3://bucket");
                assert!(find(tx, "missing")?.is_none());
                assert_eq!(list(tx)?.len(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_commit_ids_increase_and_burn() {
        let store = store();
        let ctx = Context::background();
        store
            .write(&ctx, "test", |tx| -> StorageResult<()> {
                let repo = insert(tx, "repo", "s3://bucket", "main", Utc::now())?.unwrap();
                let first = allocate_commit_id(tx, repo)?;
                let second = allocate_commit_id(tx, repo)?;
                assert_eq!(first, CommitId::FIRST);
                assert!(second > first);

                burn_commit_id(tx, repo, CommitId::from_raw(10))?;
                assert_eq!(allocate_commit_id(tx, repo)?.get(), 11);

                // burning an id below the counter is a no-op
                burn_commit_id(tx, repo, CommitId::FIRST)?;
                assert_eq!(allocate_commit_id(tx, repo)?.get(), 12);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_counters_are_per_repository() {
        let store = store();
        let ctx = Context::background();
        store
            .write(&ctx, "test", |tx| -> StorageResult<()> {
                let a = insert(tx, "repo-a", "mem://", "main", Utc::now())?.unwrap();
                let b = insert(tx, "repo-b", "mem://", "main", Utc::now())?.unwrap();
                allocate_commit_id(tx, a)?;
                allocate_commit_id(tx, a)?;
                assert_eq!(allocate_commit_id(tx, b)?, CommitId::FIRST);
                Ok(())
            })
            .unwrap();
    }
}
