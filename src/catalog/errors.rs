//! Catalog error types.

use std::error::Error as StdError;

use thiserror::Error;

use crate::catalog::hooks::HookError;
use crate::catalog::reference::RefParseError;
use crate::storage::{CommitId, InvalidNameError, OperationError, StorageError};
use crate::transaction::Interrupt;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("branch not found: {repository}/{branch}")]
    BranchNotFound { repository: String, branch: String },

    #[error("entry not found: {path} at {reference}")]
    EntryNotFound { reference: String, path: String },

    #[error("commit not found: {reference} in {repository}")]
    CommitNotFound { repository: String, reference: String },

    #[error("repository already exists: {0}")]
    RepositoryAlreadyExists(String),

    #[error("branch already exists: {repository}/{branch}")]
    BranchAlreadyExists { repository: String, branch: String },

    /// A repository or branch name failed validation.
    #[error("invalid {kind} name '{name}': {source}")]
    InvalidName {
        kind: &'static str,
        name: String,
        #[source]
        source: InvalidNameError,
    },

    /// Caller-supplied arguments are unusable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The branch has no staged changes.
    #[error("nothing to commit on {repository}/{branch}")]
    NothingToCommit { repository: String, branch: String },

    /// A post-commit hook vetoed the commit. The hook's own error is the source.
    #[error("post-commit hook {index} rejected commit {commit_id}: {source}")]
    Hook {
        commit_id: CommitId,
        index: usize,
        #[source]
        source: HookError,
    },

    #[error("invalid reference: {0}")]
    InvalidReference(#[from] RefParseError),
}

impl CatalogError {
    pub(crate) fn invalid_repository(name: &str, source: InvalidNameError) -> Self {
        CatalogError::InvalidName { kind: "repository", name: name.to_string(), source }
    }

    pub(crate) fn invalid_branch(name: &str, source: InvalidNameError) -> Self {
        CatalogError::InvalidName { kind: "branch", name: name.to_string(), source }
    }

    pub(crate) fn branch_not_found(repository: &str, branch: &str) -> Self {
        CatalogError::BranchNotFound {
            repository: repository.to_string(),
            branch: branch.to_string(),
        }
    }

    /// Check if this is a "not found" error of any kind.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::RepositoryNotFound(_)
                | CatalogError::BranchNotFound { .. }
                | CatalogError::EntryNotFound { .. }
                | CatalogError::CommitNotFound { .. }
        )
    }

    /// Check if the caller passed unusable input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::Validation(_)
                | CatalogError::InvalidName { .. }
                | CatalogError::InvalidReference(_)
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            CatalogError::RepositoryAlreadyExists(_) | CatalogError::BranchAlreadyExists { .. }
        )
    }

    /// Check if the operation was stopped by its context.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt().is_some()
    }

    /// the interrupt reason, when the context stopped the operation
    pub fn interrupt(&self) -> Option<Interrupt> {
        match self {
            CatalogError::Storage(StorageError::Interrupted(reason)) => Some(*reason),
            _ => None,
        }
    }

    /// The error a vetoing post-commit hook returned, if this is a veto.
    pub fn hook_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            CatalogError::Hook { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<Interrupt> for CatalogError {
    fn from(reason: Interrupt) -> Self {
        CatalogError::Storage(StorageError::Interrupted(reason))
    }
}

impl OperationError for CatalogError {
    fn in_operation(self, operation: &'static str) -> Self {
        match self {
            CatalogError::Storage(e) => CatalogError::Storage(e.in_operation(operation)),
            other => other,
        }
    }
}
