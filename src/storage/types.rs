//! core type-safe wrappers around the identifiers the catalog stores.

use std::collections::BTreeMap;
use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// user metadata attached to entries and commits
pub type Metadata = BTreeMap<String, String>;

/// Repository-scoped commit identifier.
///
/// Commit ids are allocated from a per-repository counter, so within one
/// repository they form a total order that matches creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitId(i64);

impl CommitId {
    /// the first id a repository hands out
    pub const FIRST: CommitId = CommitId(1);

    /// wrap a raw id. returns None for ids that can never be allocated.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub(crate) fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// the raw integer value
    pub fn get(&self) -> i64 {
        self.0
    }

    /// the id allocated right after this one
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for CommitId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for CommitId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(CommitId)
    }
}

/// row id of a repository (internal, never exposed in references)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RepositoryId(pub(crate) i64);

/// row id of a branch. deleted branches keep their id so history stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BranchId(pub(crate) i64);

macro_rules! sql_row_id {
    ($ty:ident) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map($ty)
            }
        }
    };
}

sql_row_id!(RepositoryId);
sql_row_id!(BranchId);

/// A validated repository name.
///
/// Valid names:
/// - 3-63 characters
/// - lowercase ASCII letters, digits and hyphens
/// - must start with a letter or digit
///
/// The name is part of every commit reference, so it must never contain
/// the `:` separator the reference codec relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryName(String);

impl RepositoryName {
    const MIN_LEN: usize = 3;
    const MAX_LEN: usize = 63;

    /// create a new RepositoryName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        let Some(first_char) = name.chars().next() else {
            return Err(InvalidNameError::Empty);
        };

        if name.len() < Self::MIN_LEN {
            return Err(InvalidNameError::TooShort(name.len()));
        }

        if name.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        if !(first_char.is_ascii_lowercase() || first_char.is_ascii_digit()) {
            return Err(InvalidNameError::InvalidStart(first_char));
        }

        for (i, c) in name.chars().enumerate() {
            if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RepositoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated branch name.
///
/// Branch names start with a word character followed by word characters or
/// hyphens. The restriction keeps `branch:HEAD` unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchName(String);

impl BranchName {
    /// the default branch used when a repository is created without one
    pub const DEFAULT: &'static str = "main";

    const MAX_LEN: usize = 256;

    /// create a new BranchName
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        let Some(first_char) = name.chars().next() else {
            return Err(InvalidNameError::Empty);
        };

        if name.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        if !is_word_char(first_char) {
            return Err(InvalidNameError::InvalidStart(first_char));
        }

        for (i, c) in name.chars().enumerate() {
            if !is_word_char(c) && c != '-' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// the default branch name
    pub fn default_branch() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// get the short name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// error type for invalid names (repositories, branches)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooShort(usize),
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooShort(len) => write!(f, "name too short: {} characters", len),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "name cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidNameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_name_valid() {
        assert!(RepositoryName::new("repository").is_ok());
        assert!(RepositoryName::new("repo-1").is_ok());
        assert!(RepositoryName::new("123").is_ok());
    }

    #[test]
    fn test_repository_name_invalid() {
        assert_eq!(RepositoryName::new(""), Err(InvalidNameError::Empty));
        assert_eq!(RepositoryName::new("ab"), Err(InvalidNameError::TooShort(2)));
        assert!(RepositoryName::new("-repo").is_err());
        assert!(RepositoryName::new("RepoX").is_err()); // uppercase
        assert!(RepositoryName::new("repo:1").is_err()); // reference separator
        assert!(RepositoryName::new("a".repeat(64)).is_err());
    }

    #[test]
    fn test_branch_name() {
        assert!(BranchName::new("main").is_ok());
        assert!(BranchName::new("feature-1").is_ok());
        assert!(BranchName::new("_tmp").is_ok());
        assert!(BranchName::new("").is_err());
        assert!(BranchName::new("-x").is_err());
        assert!(BranchName::new("main:HEAD").is_err());
        assert!(BranchName::new("a/b").is_err());
        assert_eq!(BranchName::default_branch().as_str(), "main");
    }

    #[test]
    fn test_commit_id_ordering() {
        assert_eq!(CommitId::new(0), None);
        assert_eq!(CommitId::new(-3), None);
        let first = CommitId::FIRST;
        assert!(first.next() > first);
        assert_eq!(first.next().get(), 2);
    }
}
