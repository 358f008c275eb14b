//! Branch management.
//!
//! A new branch starts with a commit of its own whose single parent is the
//! source branch's HEAD. Reads on the new branch fall through to the source
//! as it was at that HEAD, so later commits on the source stay invisible.

use crate::catalog::cataloger::Cataloger;
use crate::catalog::commit::{record_commit, SYSTEM_COMMITTER};
use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::model::{Branch, CommitLog};
use crate::catalog::reference::commit_reference;
use crate::storage::{branches, repositories, BranchName, Metadata};
use crate::transaction::Context;

impl Cataloger {
    /// Create `new_branch` from the current HEAD of `source_branch`.
    ///
    /// Returns the branch's creation commit. Post-commit hooks are not run
    /// for it.
    pub fn create_branch(
        &self,
        ctx: &Context,
        repository: &str,
        new_branch: &str,
        source_branch: &str,
    ) -> CatalogResult<CommitLog> {
        let name = BranchName::new(new_branch).map_err(|e| CatalogError::invalid_branch(new_branch, e))?;

        self.store().write(ctx, "create_branch", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let source = Self::resolve_branch(tx, &repo, source_branch)?;

            let already_exists = || CatalogError::BranchAlreadyExists {
                repository: repo.name.to_string(),
                branch: name.to_string(),
            };
            let branch_id = branches::insert(tx, repo.row.id, name.as_str(), Some((source.id, source.head)))?
                .ok_or_else(already_exists)?;

            let commit_id = repositories::allocate_commit_id(tx, repo.row.id)?;
            let log = CommitLog {
                reference: commit_reference(&repo.name, commit_id),
                committer: SYSTEM_COMMITTER.to_string(),
                message: format!("Branch '{}' created, source '{}'", name, source.name),
                creation_date: tx.started_at(),
                metadata: Metadata::new(),
                parents: source
                    .head
                    .map(|head| commit_reference(&repo.name, head))
                    .into_iter()
                    .collect(),
            };
            record_commit(tx, &repo, branch_id, commit_id, &log)?;

            tracing::info!(
                tx = %tx.id(),
                repository = %repo.name,
                branch = %name,
                source = %source.name,
                commit_id = %commit_id,
                "created branch"
            );
            Ok(log)
        })
    }

    /// Delete a branch and drop whatever it had staged.
    ///
    /// Commits made on the branch stay readable through their references.
    /// The default branch cannot be deleted.
    pub fn delete_branch(&self, ctx: &Context, repository: &str, branch: &str) -> CatalogResult<()> {
        self.store().write(ctx, "delete_branch", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let row = Self::resolve_branch(tx, &repo, branch)?;
            if row.name == repo.row.default_branch {
                return Err(CatalogError::Validation(format!(
                    "cannot delete default branch '{}'",
                    row.name
                )));
            }

            branches::soft_delete(tx, row.id)?;
            tracing::info!(tx = %tx.id(), repository = %repo.name, branch = %row.name, "deleted branch");
            Ok(())
        })
    }

    /// List live branches whose name starts with `prefix`, in name order.
    pub fn list_branches(
        &self,
        ctx: &Context,
        repository: &str,
        prefix: &str,
        limit: Option<usize>,
    ) -> CatalogResult<(Vec<Branch>, bool)> {
        let limit = self.config().effective_limit(limit);

        self.store().read(ctx, "list_branches", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let mut rows = branches::list_live(tx, repo.row.id, prefix, "", limit)?;
            let has_more = rows.len() > limit;
            rows.truncate(limit);

            let branches = rows
                .into_iter()
                .map(|row| Branch {
                    repository: repo.name.to_string(),
                    head: row.head.map(|head| commit_reference(&repo.name, head)),
                    name: row.name,
                })
                .collect();
            Ok((branches, has_more))
        })
    }

    /// The reference of the branch's HEAD commit.
    pub fn get_branch_reference(&self, ctx: &Context, repository: &str, branch: &str) -> CatalogResult<String> {
        self.store().read(ctx, "get_branch_reference", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let row = Self::resolve_branch(tx, &repo, branch)?;
            row.head
                .map(|head| commit_reference(&repo.name, head))
                .ok_or_else(|| CatalogError::CommitNotFound {
                    repository: repo.name.to_string(),
                    reference: format!("{}:HEAD", row.name),
                })
        })
    }
}
