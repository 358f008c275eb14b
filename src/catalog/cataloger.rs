//! The cataloger handle and reference resolution.

use std::sync::Arc;

use crate::catalog::errors::{CatalogError, CatalogResult};
use crate::catalog::hooks::Hooks;
use crate::catalog::reference::{parse_ref, Ref};
use crate::config::CatalogerConfig;
use crate::storage::branches::{self, BranchRow, LineageSegment};
use crate::storage::commits::{self, CommitRow};
use crate::storage::repositories::{self, RepositoryRow};
use crate::storage::{BranchId, BranchName, CommitId, RepositoryName, Store};
use crate::transaction::Tx;

/// Git-like catalog of data lake objects.
///
/// Clone this to share across threads - it uses Arc internally. Every
/// operation runs as one transaction against the store.
#[derive(Clone)]
pub struct Cataloger {
    inner: Arc<CatalogerInner>,
}

struct CatalogerInner {
    store: Store,
    hooks: Hooks,
    config: CatalogerConfig,
}

/// A repository looked up inside a transaction.
pub(crate) struct ResolvedRepository {
    pub name: RepositoryName,
    pub row: RepositoryRow,
}

/// What a read reference resolves to.
///
/// `staged` is set for staging references. `lineage` is the committed read
/// path; it is empty for a branch that has no commits yet.
pub(crate) struct Snapshot {
    pub staged: Option<BranchId>,
    pub lineage: Vec<LineageSegment>,
}

impl Cataloger {
    /// Open a cataloger with an empty hook registry.
    pub fn open(config: CatalogerConfig) -> CatalogResult<Self> {
        Self::with_hooks(config, Hooks::new())
    }

    /// Open a cataloger that dispatches commits to `hooks`.
    pub fn with_hooks(config: CatalogerConfig, hooks: Hooks) -> CatalogResult<Self> {
        let store = Store::open(&config)?;
        Ok(Self {
            inner: Arc::new(CatalogerInner { store, hooks, config }),
        })
    }

    /// the hook registry commits are dispatched to
    pub fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    pub fn config(&self) -> &CatalogerConfig {
        &self.inner.config
    }

    pub(crate) fn store(&self) -> &Store {
        &self.inner.store
    }

    // ==================== Resolution ====================

    pub(crate) fn resolve_repository(tx: &Tx<'_>, name: &str) -> CatalogResult<ResolvedRepository> {
        let name = RepositoryName::new(name).map_err(|e| CatalogError::invalid_repository(name, e))?;
        let row = repositories::find(tx, name.as_str())?
            .ok_or_else(|| CatalogError::RepositoryNotFound(name.to_string()))?;
        Ok(ResolvedRepository { name, row })
    }

    pub(crate) fn resolve_branch(
        tx: &Tx<'_>,
        repository: &ResolvedRepository,
        branch: &str,
    ) -> CatalogResult<BranchRow> {
        let name = BranchName::new(branch).map_err(|e| CatalogError::invalid_branch(branch, e))?;
        branches::find_live(tx, repository.row.id, name.as_str())?
            .ok_or_else(|| CatalogError::branch_not_found(repository.name.as_str(), branch))
    }

    /// Find the commit a commit-token reference names in `repository`.
    ///
    /// A token minted for another repository is reported as not found.
    fn resolve_token(
        tx: &Tx<'_>,
        repository: &ResolvedRepository,
        token_repository: &RepositoryName,
        commit_id: CommitId,
        reference: &str,
    ) -> CatalogResult<CommitRow> {
        let not_found = || CatalogError::CommitNotFound {
            repository: repository.name.to_string(),
            reference: reference.to_string(),
        };
        if token_repository != &repository.name {
            return Err(not_found());
        }
        commits::get(tx, repository.row.id, commit_id)?.ok_or_else(not_found)
    }

    /// Resolve a reference for entry reads.
    pub(crate) fn resolve_snapshot(
        tx: &Tx<'_>,
        repository: &ResolvedRepository,
        reference: &str,
    ) -> CatalogResult<Snapshot> {
        let parsed = parse_ref(reference)?;
        let snapshot = match &parsed {
            Ref::Staging { branch } | Ref::Head { branch } => {
                let row = Self::resolve_branch(tx, repository, branch.as_str())?;
                let lineage = match row.head {
                    Some(head) => branches::lineage(tx, row.id, head)?,
                    None => Vec::new(),
                };
                let staged = parsed.is_staging().then_some(row.id);
                Snapshot { staged, lineage }
            }
            Ref::Commit { repository: token_repository, commit_id } => {
                let commit = Self::resolve_token(tx, repository, token_repository, *commit_id, reference)?;
                let lineage = branches::lineage(tx, commit.branch_id, commit.commit_id)?;
                Snapshot { staged: None, lineage }
            }
        };

        tracing::debug!(
            tx = %tx.id(),
            repository = %repository.name,
            reference,
            staging = snapshot.staged.is_some(),
            segments = snapshot.lineage.len(),
            "resolved reference"
        );
        Ok(snapshot)
    }

    /// Resolve a reference to the commit it points at.
    ///
    /// Branch references, staging or HEAD, resolve to the branch's HEAD.
    pub(crate) fn resolve_commit(
        tx: &Tx<'_>,
        repository: &ResolvedRepository,
        reference: &str,
    ) -> CatalogResult<CommitRow> {
        match parse_ref(reference)? {
            Ref::Staging { branch } | Ref::Head { branch } => {
                let row = Self::resolve_branch(tx, repository, branch.as_str())?;
                Self::head_commit(tx, repository, &row)
            }
            Ref::Commit { repository: token_repository, commit_id } => {
                Self::resolve_token(tx, repository, &token_repository, commit_id, reference)
            }
        }
    }

    /// the HEAD commit of a branch
    pub(crate) fn head_commit(
        tx: &Tx<'_>,
        repository: &ResolvedRepository,
        branch: &BranchRow,
    ) -> CatalogResult<CommitRow> {
        let not_found = || CatalogError::CommitNotFound {
            repository: repository.name.to_string(),
            reference: format!("{}:HEAD", branch.name),
        };
        let head = branch.head.ok_or_else(not_found)?;
        commits::get(tx, repository.row.id, head)?.ok_or_else(not_found)
    }
}

impl std::fmt::Debug for Cataloger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cataloger")
            .field("store", &self.inner.store)
            .field("hooks", &self.inner.hooks)
            .finish()
    }
}
