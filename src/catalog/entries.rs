//! Entry operations: staging writes and snapshot reads.

use crate::catalog::cataloger::{Cataloger, Snapshot};
use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::model::{CreateEntryParams, Entry, GetEntryParams};
use crate::storage::branches;
use crate::storage::entries::{self, EntryRow};
use crate::storage::listing::EntryMerge;
use crate::transaction::{Context, Tx};

impl Cataloger {
    /// Stage `entry` on `branch`, replacing whatever was staged for its path.
    ///
    /// Returns the staged entry. With a dedup id its physical address may be
    /// the one recorded by an earlier entry of the same content.
    pub fn create_entry(
        &self,
        ctx: &Context,
        repository: &str,
        branch: &str,
        entry: Entry,
        params: CreateEntryParams,
    ) -> CatalogResult<Entry> {
        if entry.path.is_empty() {
            return Err(CatalogError::Validation("entry path cannot be empty".into()));
        }
        if entry.size < 0 {
            return Err(CatalogError::Validation(format!(
                "entry size cannot be negative: {}",
                entry.size
            )));
        }
        if params.dedup_id.as_deref() == Some("") {
            return Err(CatalogError::Validation("dedup id cannot be empty".into()));
        }

        self.store().write(ctx, "create_entry", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let branch = Self::resolve_branch(tx, &repo, branch)?;

            let mut row = entry.to_row();
            if let Some(dedup_id) = &params.dedup_id {
                match entries::find_dedup(tx, repo.row.id, dedup_id)? {
                    Some(address) => row.physical_address = address,
                    None => entries::insert_dedup(tx, repo.row.id, dedup_id, &row.physical_address)?,
                }
            }

            entries::upsert_staged(tx, branch.id, &row)?;
            Ok(Entry::from_row(row))
        })
    }

    /// Delete `path` from `branch`.
    ///
    /// A path that only exists in staging is unstaged. A path live at the
    /// branch HEAD gets a staged tombstone. Anything else is not found.
    pub fn delete_entry(&self, ctx: &Context, repository: &str, branch: &str, path: &str) -> CatalogResult<()> {
        self.store().write(ctx, "delete_entry", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let branch = Self::resolve_branch(tx, &repo, branch)?;

            let committed_live = match branch.head {
                Some(head) => {
                    let lineage = branches::lineage(tx, branch.id, head)?;
                    entries::get_committed(tx, &lineage, path)?.is_some_and(|row| !row.is_tombstone)
                }
                None => false,
            };
            let staged = entries::get_staged(tx, branch.id, path)?;

            let not_found = || CatalogError::EntryNotFound {
                reference: branch.name.clone(),
                path: path.to_string(),
            };
            match staged {
                Some(row) if row.is_tombstone => Err(not_found()),
                _ if committed_live => {
                    entries::upsert_staged(tx, branch.id, &EntryRow::tombstone(path, tx.started_at()))?;
                    Ok(())
                }
                Some(_) => {
                    entries::remove_staged(tx, branch.id, path)?;
                    Ok(())
                }
                None => Err(not_found()),
            }
        })
    }

    /// Read `path` as seen by `reference`.
    pub fn get_entry(
        &self,
        ctx: &Context,
        repository: &str,
        reference: &str,
        path: &str,
        _params: GetEntryParams,
    ) -> CatalogResult<Entry> {
        self.store().read(ctx, "get_entry", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let snapshot = Self::resolve_snapshot(tx, &repo, reference)?;

            lookup(tx, &snapshot, path)?
                .map(Entry::from_row)
                .ok_or_else(|| CatalogError::EntryNotFound {
                    reference: reference.to_string(),
                    path: path.to_string(),
                })
        })
    }

    /// List live entries visible at `reference`, in path order.
    ///
    /// Only paths under `prefix` and strictly after `after` are listed. With
    /// a non-empty `delimiter`, paths sharing everything up to the first
    /// delimiter past the prefix collapse into one `common_level` entry.
    /// Returns the entries and whether more follow.
    #[allow(clippy::too_many_arguments)]
    pub fn list_entries(
        &self,
        ctx: &Context,
        repository: &str,
        reference: &str,
        prefix: &str,
        after: &str,
        delimiter: &str,
        limit: Option<usize>,
    ) -> CatalogResult<(Vec<Entry>, bool)> {
        let limit = self.config().effective_limit(limit);
        let page_size = self.config().list_page_size;

        self.store().read(ctx, "list_entries", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let snapshot = Self::resolve_snapshot(tx, &repo, reference)?;
            let mut merge = EntryMerge::new(tx, snapshot.staged, &snapshot.lineage, prefix, after, page_size);

            let mut results: Vec<Entry> = Vec::new();
            while results.len() <= limit {
                let Some(row) = merge.next_entry()? else {
                    break;
                };

                let entry = match common_level(&row.path, prefix, delimiter) {
                    Some(level) => {
                        let seen = results.last().is_some_and(|e| e.common_level && e.path == level);
                        if seen || level <= after {
                            continue;
                        }
                        Entry::common_prefix(level.to_string())
                    }
                    None => Entry::from_row(row),
                };
                results.push(entry);
            }

            let has_more = results.len() > limit;
            results.truncate(limit);
            Ok((results, has_more))
        })
    }
}

/// the live row for `path` in a resolved snapshot
fn lookup(tx: &Tx<'_>, snapshot: &Snapshot, path: &str) -> CatalogResult<Option<EntryRow>> {
    if let Some(branch) = snapshot.staged {
        if let Some(row) = entries::get_staged(tx, branch, path)? {
            return Ok((!row.is_tombstone).then_some(row));
        }
    }
    let row = entries::get_committed(tx, &snapshot.lineage, path)?;
    Ok(row.filter(|row| !row.is_tombstone))
}

/// The delimited group `path` falls into, e.g. `a/b/` for `a/b/c` listed
/// with prefix `a/` and delimiter `/`.
fn common_level<'p>(path: &'p str, prefix: &str, delimiter: &str) -> Option<&'p str> {
    if delimiter.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(prefix)?;
    let at = rest.find(delimiter)?;
    Some(&path[..prefix.len() + at + delimiter.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testutil::*;
    use crate::config::CatalogerConfig;
    use crate::storage::Metadata;

    #[test]
    fn test_common_level() {
        assert_eq!(common_level("a/b/c", "a/", "/"), Some("a/b/"));
        assert_eq!(common_level("a/b", "a/", "/"), None);
        assert_eq!(common_level("a/b", "a/", ""), None);
        assert_eq!(common_level("x--y--z", "", "--"), Some("x--"));
    }

    #[test]
    fn test_create_entry_validation() {
        let (cataloger, ctx) = catalog_with_repo();
        let err = cataloger
            .create_entry(&ctx, TEST_REPO, TEST_BRANCH, entry("", "s", 1), Default::default())
            .unwrap_err();
        assert!(err.is_validation());

        let err = cataloger
            .create_entry(&ctx, TEST_REPO, TEST_BRANCH, entry("f", "s", -1), Default::default())
            .unwrap_err();
        assert!(err.is_validation());

        let err = cataloger
            .create_entry(&ctx, "repo2", TEST_BRANCH, entry("f", "s", 1), Default::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::RepositoryNotFound(_)));

        let err = cataloger
            .create_entry(&ctx, TEST_REPO, "nobranch", entry("f", "s", 1), Default::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::BranchNotFound { .. }));
    }

    #[test]
    fn test_staged_entry_is_readable() {
        let (cataloger, ctx) = catalog_with_repo();
        let metadata = Metadata::from([("color".to_string(), "blue".to_string())]);
        let staged = cataloger
            .create_entry(
                &ctx,
                TEST_REPO,
                TEST_BRANCH,
                entry("data/file1", "sum1", 42).with_metadata(metadata.clone()),
                Default::default(),
            )
            .unwrap();

        let got = cataloger
            .get_entry(&ctx, TEST_REPO, TEST_BRANCH, "data/file1", Default::default())
            .unwrap();
        assert_eq!(got, staged);
        assert_eq!(got.metadata, metadata);
        assert_eq!(got.size, 42);

        // not committed yet
        let err = cataloger
            .get_entry(&ctx, TEST_REPO, &head(TEST_BRANCH), "data/file1", Default::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_uncommitted_entry_unstages_it() {
        let (cataloger, ctx) = catalog_with_repo();
        put(&cataloger, &ctx, "file1", "sum1");
        cataloger.delete_entry(&ctx, TEST_REPO, TEST_BRANCH, "file1").unwrap();

        let err = cataloger
            .get_entry(&ctx, TEST_REPO, TEST_BRANCH, "file1", Default::default())
            .unwrap_err();
        assert!(err.is_not_found());

        // nothing left to commit: the row was removed, not tombstoned
        let err = cataloger
            .commit(&ctx, TEST_REPO, TEST_BRANCH, "msg", "tester", Metadata::new())
            .unwrap_err();
        assert!(matches!(err, CatalogError::NothingToCommit { .. }));

        let err = cataloger.delete_entry(&ctx, TEST_REPO, TEST_BRANCH, "file1").unwrap_err();
        assert!(matches!(err, CatalogError::EntryNotFound { .. }));
    }

    #[test]
    fn test_delete_committed_entry_until_committed() {
        let (cataloger, ctx) = catalog_with_repo();
        put(&cataloger, &ctx, "/file1", "sum1");
        commit(&cataloger, &ctx, "add file1");

        cataloger.delete_entry(&ctx, TEST_REPO, TEST_BRANCH, "/file1").unwrap();

        let err = cataloger
            .get_entry(&ctx, TEST_REPO, TEST_BRANCH, "/file1", Default::default())
            .unwrap_err();
        assert!(err.is_not_found());

        let at_head = cataloger
            .get_entry(&ctx, TEST_REPO, &head(TEST_BRANCH), "/file1", Default::default())
            .unwrap();
        assert_eq!(at_head.checksum, "sum1");

        // deleting twice is an error
        let err = cataloger.delete_entry(&ctx, TEST_REPO, TEST_BRANCH, "/file1").unwrap_err();
        assert!(err.is_not_found());

        commit(&cataloger, &ctx, "delete file1");
        let err = cataloger
            .get_entry(&ctx, TEST_REPO, &head(TEST_BRANCH), "/file1", Default::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_overwrite_after_delete_restages() {
        let (cataloger, ctx) = catalog_with_repo();
        put(&cataloger, &ctx, "file1", "sum1");
        commit(&cataloger, &ctx, "add");

        cataloger.delete_entry(&ctx, TEST_REPO, TEST_BRANCH, "file1").unwrap();
        put(&cataloger, &ctx, "file1", "sum2");
        let got = cataloger
            .get_entry(&ctx, TEST_REPO, TEST_BRANCH, "file1", Default::default())
            .unwrap();
        assert_eq!(got.checksum, "sum2");

        // re-staged content can be deleted again, which tombstones it
        cataloger.delete_entry(&ctx, TEST_REPO, TEST_BRANCH, "file1").unwrap();
        commit(&cataloger, &ctx, "delete");
        assert!(list_paths(&cataloger, &ctx, &head(TEST_BRANCH)).is_empty());
    }

    #[test]
    fn test_get_entry_missing_path() {
        let (cataloger, ctx) = catalog_with_repo();
        let err = cataloger
            .get_entry(&ctx, TEST_REPO, TEST_BRANCH, "nothing", Default::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::EntryNotFound { .. }));

        let err = cataloger
            .get_entry(&ctx, TEST_REPO, "bad ref", "nothing", Default::default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidReference(_)));
    }

    #[test]
    fn test_dedup_reuses_first_address() {
        let (cataloger, ctx) = catalog_with_repo();
        let first = cataloger
            .create_entry(
                &ctx,
                TEST_REPO,
                TEST_BRANCH,
                Entry::new("a", "/addr/one", "same", 10),
                CreateEntryParams::with_dedup_id("content-1"),
            )
            .unwrap();
        assert_eq!(first.physical_address, "/addr/one");

        let second = cataloger
            .create_entry(
                &ctx,
                TEST_REPO,
                TEST_BRANCH,
                Entry::new("b", "/addr/two", "same", 10),
                CreateEntryParams::with_dedup_id("content-1"),
            )
            .unwrap();
        assert_eq!(second.physical_address, "/addr/one");

        let got = cataloger
            .get_entry(&ctx, TEST_REPO, TEST_BRANCH, "b", Default::default())
            .unwrap();
        assert_eq!(got.physical_address, "/addr/one");

        let err = cataloger
            .create_entry(
                &ctx,
                TEST_REPO,
                TEST_BRANCH,
                Entry::new("c", "/addr/three", "other", 10),
                CreateEntryParams::with_dedup_id(""),
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_list_staging_overlays_head() {
        let (cataloger, ctx) = catalog_with_repo();
        for (i, path) in ["c", "a", "b"].iter().enumerate() {
            put(&cataloger, &ctx, path, &format!("sum{}", i));
            commit(&cataloger, &ctx, &format!("commit {}", i));
        }
        assert_eq!(list_paths(&cataloger, &ctx, TEST_BRANCH), vec!["a", "b", "c"]);
        assert_eq!(list_paths(&cataloger, &ctx, &head(TEST_BRANCH)), vec!["a", "b", "c"]);

        put(&cataloger, &ctx, "d", "sum3");
        cataloger.delete_entry(&ctx, TEST_REPO, TEST_BRANCH, "a").unwrap();
        assert_eq!(list_paths(&cataloger, &ctx, TEST_BRANCH), vec!["b", "c", "d"]);
        assert_eq!(list_paths(&cataloger, &ctx, &head(TEST_BRANCH)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_list_with_prefix_after_and_limit() {
        let (cataloger, ctx) = catalog_with_repo();
        for path in ["a/1", "a/2", "a/3", "b/1", "ab"] {
            put(&cataloger, &ctx, path, "s");
        }

        let (entries, has_more) = cataloger
            .list_entries(&ctx, TEST_REPO, TEST_BRANCH, "a/", "", "", Some(2))
            .unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a/1", "a/2"]);
        assert!(has_more);

        let (entries, has_more) = cataloger
            .list_entries(&ctx, TEST_REPO, TEST_BRANCH, "a/", "a/2", "", Some(2))
            .unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a/3"]);
        assert!(!has_more);
    }

    #[test]
    fn test_list_with_delimiter() {
        let (cataloger, ctx) = catalog_with_repo();
        for path in ["root.txt", "x/1", "x/2", "x/y/3", "z/1"] {
            put(&cataloger, &ctx, path, "s");
        }
        commit(&cataloger, &ctx, "tree");

        let (entries, has_more) = cataloger
            .list_entries(&ctx, TEST_REPO, &head(TEST_BRANCH), "", "", "/", None)
            .unwrap();
        assert!(!has_more);
        let listed: Vec<_> = entries.iter().map(|e| (e.path.as_str(), e.common_level)).collect();
        assert_eq!(listed, vec![("root.txt", false), ("x/", true), ("z/", true)]);

        let (entries, _) = cataloger
            .list_entries(&ctx, TEST_REPO, &head(TEST_BRANCH), "x/", "", "/", None)
            .unwrap();
        let listed: Vec<_> = entries.iter().map(|e| (e.path.as_str(), e.common_level)).collect();
        assert_eq!(listed, vec![("x/1", false), ("x/2", false), ("x/y/", true)]);

        // resuming after a group skips the whole group
        let (entries, has_more) = cataloger
            .list_entries(&ctx, TEST_REPO, &head(TEST_BRANCH), "", "x/", "/", Some(1))
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "z/");
        assert!(!has_more);
    }

    #[test]
    fn test_list_limit_is_clamped() {
        let cataloger =
            Cataloger::open(CatalogerConfig::in_memory().list_max_limit(2).list_page_size(1)).unwrap();
        let ctx = Context::background();
        cataloger
            .create_repository(&ctx, TEST_REPO, "s3://bucket", TEST_BRANCH)
            .unwrap();
        for path in ["a", "b", "c"] {
            put(&cataloger, &ctx, path, "s");
        }

        let (entries, has_more) = cataloger
            .list_entries(&ctx, TEST_REPO, TEST_BRANCH, "", "", "", Some(50))
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(has_more);
    }
}
