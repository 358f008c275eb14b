//! Reference codec.
//!
//! Grammar:
//!
//! ```text
//! reference := branch            staging area of the branch
//!            | branch ":HEAD"    current HEAD commit of the branch
//!            | "~" token         one commit, anywhere in the repository
//! token     := base58(repository ":" commit-id)
//! ```
//!
//! Tokens are a pure function of the repository name and the commit id, so
//! the same commit always gets the same token and a token can be checked
//! against the repository it is used in.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::storage::{BranchName, CommitId, InvalidNameError, RepositoryName};

const TOKEN_MARKER: char = '~';
const HEAD_SUFFIX: &str = ":HEAD";

/// A parsed reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ref {
    /// the uncommitted view of a branch
    Staging { branch: BranchName },
    /// whatever commit the branch points at when the reference is resolved
    Head { branch: BranchName },
    /// exactly one commit
    Commit { repository: RepositoryName, commit_id: CommitId },
}

impl Ref {
    /// the commit id, for commit references
    pub fn commit_id(&self) -> Option<CommitId> {
        match self {
            Ref::Commit { commit_id, .. } => Some(*commit_id),
            _ => None,
        }
    }

    /// the branch, for staging and HEAD references
    pub fn branch(&self) -> Option<&BranchName> {
        match self {
            Ref::Staging { branch } | Ref::Head { branch } => Some(branch),
            Ref::Commit { .. } => None,
        }
    }

    pub fn is_staging(&self) -> bool {
        matches!(self, Ref::Staging { .. })
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Staging { branch } => write!(f, "{}", branch),
            Ref::Head { branch } => write!(f, "{}{}", branch, HEAD_SUFFIX),
            Ref::Commit { repository, commit_id } => {
                write!(f, "{}", commit_reference(repository, *commit_id))
            }
        }
    }
}

impl FromStr for Ref {
    type Err = RefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ref(s)
    }
}

/// Errors from [`parse_ref`].
#[derive(Debug, Error)]
pub enum RefParseError {
    #[error("empty reference")]
    Empty,

    #[error("commit token is not valid base58: {0}")]
    Base58(#[from] bs58::decode::Error),

    #[error("commit token payload is not UTF-8")]
    NotUtf8,

    #[error("commit token has no repository separator")]
    MissingSeparator,

    #[error("commit token carries an invalid commit id '{0}'")]
    InvalidCommitId(String),

    #[error("commit token names an invalid repository: {0}")]
    InvalidRepository(#[source] InvalidNameError),

    #[error("invalid branch in reference '{reference}': {source}")]
    InvalidBranch {
        reference: String,
        #[source]
        source: InvalidNameError,
    },
}

/// The token for commit `commit_id` of `repository`.
pub fn commit_reference(repository: &RepositoryName, commit_id: CommitId) -> String {
    let payload = format!("{}:{}", repository, commit_id);
    format!("{}{}", TOKEN_MARKER, bs58::encode(payload).into_string())
}

/// Parse a reference string.
pub fn parse_ref(reference: &str) -> Result<Ref, RefParseError> {
    if reference.is_empty() {
        return Err(RefParseError::Empty);
    }

    if let Some(token) = reference.strip_prefix(TOKEN_MARKER) {
        return parse_token(token);
    }

    let (name, head) = match reference.strip_suffix(HEAD_SUFFIX) {
        Some(name) => (name, true),
        None => (reference, false),
    };
    let branch = BranchName::new(name).map_err(|source| RefParseError::InvalidBranch {
        reference: reference.to_string(),
        source,
    })?;

    Ok(if head { Ref::Head { branch } } else { Ref::Staging { branch } })
}

fn parse_token(token: &str) -> Result<Ref, RefParseError> {
    let bytes = bs58::decode(token).into_vec()?;
    let payload = String::from_utf8(bytes).map_err(|_| RefParseError::NotUtf8)?;

    // repository names never contain ':', so the last one is the separator
    let (repository, id) = payload
        .rsplit_once(':')
        .ok_or(RefParseError::MissingSeparator)?;

    let repository = RepositoryName::new(repository).map_err(RefParseError::InvalidRepository)?;
    let commit_id = id
        .parse::<i64>()
        .ok()
        .and_then(CommitId::new)
        .ok_or_else(|| RefParseError::InvalidCommitId(id.to_string()))?;

    Ok(Ref::Commit { repository, commit_id })
}
