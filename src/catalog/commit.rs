//! The commit engine.
//!
//! A commit is one write transaction:
//!
//! ```text
//!   resolve repository + branch ─► validate ─► staged rows? ─► allocate id
//!        │                                                        │
//!        │                          ┌─────────────────────────────┘
//!        ▼                          ▼
//!   (abort on error)     build CommitLog ─► post-commit hooks ─► insert log
//!                                                                  │
//!                                   advance HEAD ◄─ fold staging ◄─┘
//! ```
//!
//! Any failure rolls the whole transaction back. Once hooks have seen a
//! commit id, a failed commit burns that id in a follow-up write so it is
//! never handed out again.

use std::cell::Cell;

use crate::catalog::cataloger::{Cataloger, ResolvedRepository};
use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::model::CommitLog;
use crate::catalog::reference::commit_reference;
use crate::storage::commits::{self, CommitRow};
use crate::storage::{branches, entries, repositories, BranchId, CommitId, Metadata};
use crate::transaction::{Context, Tx};

/// committer recorded on commits the cataloger makes itself
pub(crate) const SYSTEM_COMMITTER: &str = "cataloger";

impl Cataloger {
    /// Commit everything staged on `branch`.
    pub fn commit(
        &self,
        ctx: &Context,
        repository: &str,
        branch: &str,
        message: &str,
        committer: &str,
        metadata: Metadata,
    ) -> CatalogResult<CommitLog> {
        let exposed: Cell<Option<CommitId>> = Cell::new(None);

        let result = self.store().write(ctx, "commit", |tx| {
            let repo = Self::resolve_repository(tx, repository)?;
            let branch = Self::resolve_branch(tx, &repo, branch)?;

            if message.is_empty() {
                return Err(CatalogError::Validation("commit message cannot be empty".into()));
            }
            if committer.is_empty() {
                return Err(CatalogError::Validation("committer cannot be empty".into()));
            }

            let changes = entries::count_staged(tx, branch.id)?;
            if changes == 0 {
                return Err(CatalogError::NothingToCommit {
                    repository: repo.name.to_string(),
                    branch: branch.name,
                });
            }

            let commit_id = repositories::allocate_commit_id(tx, repo.row.id)?;
            let log = CommitLog {
                reference: commit_reference(&repo.name, commit_id),
                committer: committer.to_string(),
                message: message.to_string(),
                creation_date: tx.started_at(),
                metadata,
                parents: branch
                    .head
                    .map(|head| commit_reference(&repo.name, head))
                    .into_iter()
                    .collect(),
            };

            exposed.set(Some(commit_id));
            self.hooks().dispatch_post_commit(ctx, tx, commit_id, &log)?;

            record_commit(tx, &repo, branch.id, commit_id, &log)?;
            let folded = entries::fold_staged(tx, branch.id, commit_id)?;

            tracing::info!(
                tx = %tx.id(),
                repository = %repo.name,
                branch = %branch.name,
                commit_id = %commit_id,
                changes = folded,
                "committed"
            );
            Ok(log)
        });

        if let (Err(_), Some(commit_id)) = (&result, exposed.get()) {
            self.burn_commit_id(repository, commit_id);
        }
        result
    }

    /// Make sure `commit_id` is never allocated again after a failed commit.
    ///
    /// Runs outside the caller's context: the caller may well have given up,
    /// which is why the commit failed in the first place.
    fn burn_commit_id(&self, repository: &str, commit_id: CommitId) {
        let result = self
            .store()
            .write(&Context::background(), "burn_commit_id", |tx| -> CatalogResult<()> {
                let repo = Self::resolve_repository(tx, repository)?;
                repositories::burn_commit_id(tx, repo.row.id, commit_id)?;
                Ok(())
            });

        match result {
            Ok(()) => tracing::debug!(repository, commit_id = %commit_id, "burned commit id"),
            Err(e) => tracing::warn!(
                repository,
                commit_id = %commit_id,
                error = %e,
                "failed to burn commit id of aborted commit"
            ),
        }
    }
}

/// Append `log` to the commit log and point `branch` at it.
pub(crate) fn record_commit(
    tx: &Tx<'_>,
    repository: &ResolvedRepository,
    branch: BranchId,
    commit_id: CommitId,
    log: &CommitLog,
) -> CatalogResult<()> {
    commits::insert(
        tx,
        &CommitRow {
            repository_id: repository.row.id,
            commit_id,
            branch_id: branch,
            reference: log.reference.clone(),
            committer: log.committer.clone(),
            message: log.message.clone(),
            metadata: log.metadata.clone(),
            parents: log.parents.clone(),
            creation_date: log.creation_date,
        },
    )?;
    branches::set_head(tx, branch, commit_id)?;
    Ok(())
}
