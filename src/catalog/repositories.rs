//! Repository management.

use crate::catalog::cataloger::Cataloger;
use crate::catalog::commit::{record_commit, SYSTEM_COMMITTER};
use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::model::{CommitLog, Repository};
use crate::catalog::reference::commit_reference;
use crate::storage::{branches, repositories, BranchName, Metadata, RepositoryName};
use crate::transaction::Context;

impl Cataloger {
    /// Create a repository with its default branch.
    ///
    /// The default branch starts at an empty initial commit. An empty
    /// `default_branch` selects [`BranchName::DEFAULT`].
    pub fn create_repository(
        &self,
        ctx: &Context,
        name: &str,
        storage_namespace: &str,
        default_branch: &str,
    ) -> CatalogResult<Repository> {
        let repo_name = RepositoryName::new(name).map_err(|e| CatalogError::invalid_repository(name, e))?;
        let branch_name = match default_branch {
            "" => BranchName::default_branch(),
            other => BranchName::new(other).map_err(|e| CatalogError::invalid_branch(other, e))?,
        };
        if storage_namespace.is_empty() {
            return Err(CatalogError::Validation("storage namespace cannot be empty".into()));
        }

        self.store().write(ctx, "create_repository", |tx| {
            repositories::insert(
                tx,
                repo_name.as_str(),
                storage_namespace,
                branch_name.as_str(),
                tx.started_at(),
            )?
            .ok_or_else(|| CatalogError::RepositoryAlreadyExists(repo_name.to_string()))?;

            let repo = Self::resolve_repository(tx, repo_name.as_str())?;
            let branch_id = branches::insert(tx, repo.row.id, branch_name.as_str(), None)?.ok_or_else(|| {
                CatalogError::BranchAlreadyExists {
                    repository: repo_name.to_string(),
                    branch: branch_name.to_string(),
                }
            })?;

            let commit_id = repositories::allocate_commit_id(tx, repo.row.id)?;
            let log = CommitLog {
                reference: commit_reference(&repo.name, commit_id),
                committer: SYSTEM_COMMITTER.to_string(),
                message: "Repository created".to_string(),
                creation_date: tx.started_at(),
                metadata: Metadata::new(),
                parents: Vec::new(),
            };
            record_commit(tx, &repo, branch_id, commit_id, &log)?;

            tracing::info!(
                tx = %tx.id(),
                repository = %repo.name,
                default_branch = %branch_name,
                storage_namespace,
                "created repository"
            );
            Ok(Repository::from_row(repo.row))
        })
    }

    pub fn get_repository(&self, ctx: &Context, name: &str) -> CatalogResult<Repository> {
        self.store().read(ctx, "get_repository", |tx| {
            let repo = Self::resolve_repository(tx, name)?;
            Ok(Repository::from_row(repo.row))
        })
    }

    /// all repositories, ordered by name
    pub fn list_repositories(&self, ctx: &Context) -> CatalogResult<Vec<Repository>> {
        self.store().read(ctx, "list_repositories", |tx| {
            let rows = repositories::list(tx)?;
            Ok(rows.into_iter().map(Repository::from_row).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::catalog::testutil::*;
    use crate::catalog::{CatalogError, Cataloger};
    use crate::config::CatalogerConfig;

    #[test]
    fn test_create_and_get_repository() {
        let (cataloger, ctx) = cataloger();
        let created = cataloger
            .create_repository(&ctx, TEST_REPO, "s3://bucket", TEST_BRANCH)
            .unwrap();
        assert_eq!(created.default_branch, TEST_BRANCH);
        assert_eq!(cataloger.get_repository(&ctx, TEST_REPO).unwrap(), created);

        let err = cataloger
            .create_repository(&ctx, TEST_REPO, "s3://bucket", TEST_BRANCH)
            .unwrap_err();
        assert!(matches!(err, CatalogError::RepositoryAlreadyExists(_)));
        assert!(err.is_already_exists());

        let err = cataloger.get_repository(&ctx, "repo2").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_repository_starts_with_initial_commit() {
        let (cataloger, ctx) = catalog_with_repo();
        let initial = cataloger.get_commit(&ctx, TEST_REPO, &head(TEST_BRANCH)).unwrap();
        assert_eq!(initial.message, "Repository created");
        assert!(initial.parents.is_empty());
        assert!(list_paths(&cataloger, &ctx, TEST_BRANCH).is_empty());
    }

    #[test]
    fn test_create_repository_validation() {
        let (cataloger, ctx) = cataloger();
        let err = cataloger.create_repository(&ctx, "Bad_Name", "s3://b", "main").unwrap_err();
        assert!(err.is_validation());
        let err = cataloger.create_repository(&ctx, "repo1", "s3://b", "bad/branch").unwrap_err();
        assert!(err.is_validation());
        let err = cataloger.create_repository(&ctx, "repo1", "", "main").unwrap_err();
        assert!(err.is_validation());

        let repo = cataloger.create_repository(&ctx, "repo1", "s3://b", "").unwrap();
        assert_eq!(repo.default_branch, "main");
    }

    #[test]
    fn test_list_repositories() {
        let (cataloger, ctx) = cataloger();
        for name in ["zeta", "alpha", "mid"] {
            cataloger.create_repository(&ctx, name, "s3://b", "main").unwrap();
        }
        let names: Vec<_> = cataloger
            .list_repositories(&ctx)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_catalog_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let config = CatalogerConfig::new(dir.path().join("catalog.db"));
        let ctx = crate::transaction::Context::background();

        let log = {
            let cataloger = Cataloger::open(config.clone()).unwrap();
            cataloger.create_repository(&ctx, TEST_REPO, "s3://bucket", TEST_BRANCH).unwrap();
            put(&cataloger, &ctx, "file1", "sum1");
            commit(&cataloger, &ctx, "persisted")
        };

        let cataloger = Cataloger::open(config).unwrap();
        assert_eq!(cataloger.get_commit(&ctx, TEST_REPO, &log.reference).unwrap(), log);
        let entry = cataloger
            .get_entry(&ctx, TEST_REPO, &log.reference, "file1", Default::default())
            .unwrap();
        assert_eq!(entry.checksum, "sum1");
    }
}
