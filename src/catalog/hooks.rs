//! Post-commit hook registry.
//!
//! Hooks run inside the commit transaction, after the commit log is built
//! and before anything is persisted. Returning an error vetoes the commit.
//! A hook can read and write through the [`Tx`] it receives. Its writes land
//! or roll back together with the commit.
//!
//! Hooks must not call back into the [`crate::catalog::Cataloger`] that runs
//! them: the connection is held for the whole commit.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::model::CommitLog;
use crate::storage::CommitId;
use crate::transaction::{Context, Tx};

/// error returned by a hook to veto a commit
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// a registered post-commit callback
pub type PostCommitHook =
    Arc<dyn Fn(&Context, &Tx<'_>, &CommitLog) -> Result<(), HookError> + Send + Sync>;

/// Ordered set of commit hooks.
///
/// Clones share one registry, so a handle kept after passing it to
/// [`crate::catalog::Cataloger::with_hooks`] can still register hooks.
#[derive(Clone, Default)]
pub struct Hooks {
    post_commit: Arc<RwLock<Vec<PostCommitHook>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. It runs after every hook registered before it.
    pub fn add_post_commit<F>(&self, hook: F)
    where
        F: Fn(&Context, &Tx<'_>, &CommitLog) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.post_commit.write().push(Arc::new(hook));
    }

    /// number of registered post-commit hooks
    pub fn len(&self) -> usize {
        self.post_commit.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every post-commit hook in registration order.
    ///
    /// Dispatch works on a snapshot taken up front, so hooks registered
    /// meanwhile take effect from the next commit on.
    pub(crate) fn dispatch_post_commit(
        &self,
        ctx: &Context,
        tx: &Tx<'_>,
        commit_id: CommitId,
        log: &CommitLog,
    ) -> CatalogResult<()> {
        let snapshot: Vec<PostCommitHook> = self.post_commit.read().clone();

        for (index, hook) in snapshot.iter().enumerate() {
            ctx.check()?;
            tracing::debug!(tx = %tx.id(), commit_id = %commit_id, hook = index, "running post-commit hook");

            hook(ctx, tx, log).map_err(|source| {
                tracing::warn!(
                    tx = %tx.id(),
                    commit_id = %commit_id,
                    hook = index,
                    error = %source,
                    "post-commit hook vetoed commit"
                );
                CatalogError::Hook { commit_id, index, source }
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("post_commit", &self.len())
            .finish()
    }
}
