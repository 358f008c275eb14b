//! Records the catalog hands to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::commits::CommitRow;
use crate::storage::entries::EntryRow;
use crate::storage::repositories::RepositoryRow;
use crate::storage::Metadata;

/// A file-like object tracked by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub physical_address: String,
    pub checksum: String,
    /// size in bytes, never negative
    pub size: i64,
    pub metadata: Metadata,
    pub creation_date: DateTime<Utc>,
    /// Set on listing results that stand for a group of paths sharing a
    /// delimited prefix. For those, `path` is the prefix and every other
    /// field is empty.
    #[serde(default)]
    pub common_level: bool,
}

impl Entry {
    /// A live entry created now with empty metadata.
    pub fn new(
        path: impl Into<String>,
        physical_address: impl Into<String>,
        checksum: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            path: path.into(),
            physical_address: physical_address.into(),
            checksum: checksum.into(),
            size,
            metadata: Metadata::new(),
            creation_date: Utc::now(),
            common_level: false,
        }
    }

    /// attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub(crate) fn common_prefix(prefix: String) -> Self {
        Self {
            path: prefix,
            physical_address: String::new(),
            checksum: String::new(),
            size: 0,
            metadata: Metadata::new(),
            creation_date: DateTime::<Utc>::default(),
            common_level: true,
        }
    }

    pub(crate) fn to_row(&self) -> EntryRow {
        EntryRow {
            path: self.path.clone(),
            physical_address: self.physical_address.clone(),
            checksum: self.checksum.clone(),
            size: self.size,
            metadata: self.metadata.clone(),
            creation_date: self.creation_date,
            is_tombstone: false,
        }
    }

    pub(crate) fn from_row(row: EntryRow) -> Self {
        Self {
            path: row.path,
            physical_address: row.physical_address,
            checksum: row.checksum,
            size: row.size,
            metadata: row.metadata,
            creation_date: row.creation_date,
            common_level: false,
        }
    }
}

/// One commit in a repository's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitLog {
    /// opaque token addressing this commit, see [`crate::catalog::parse_ref`]
    pub reference: String,
    pub committer: String,
    pub message: String,
    pub creation_date: DateTime<Utc>,
    pub metadata: Metadata,
    /// References of the predecessor commits. Empty only for a repository's
    /// first commit.
    pub parents: Vec<String>,
}

impl CommitLog {
    pub(crate) fn from_row(row: CommitRow) -> Self {
        Self {
            reference: row.reference,
            committer: row.committer,
            message: row.message,
            creation_date: row.creation_date,
            metadata: row.metadata,
            parents: row.parents,
        }
    }
}

/// A repository and its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub storage_namespace: String,
    pub default_branch: String,
    pub creation_date: DateTime<Utc>,
}

impl Repository {
    pub(crate) fn from_row(row: RepositoryRow) -> Self {
        Self {
            name: row.name,
            storage_namespace: row.storage_namespace,
            default_branch: row.default_branch,
            creation_date: row.creation_date,
        }
    }
}

/// A live branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub repository: String,
    pub name: String,
    /// reference of the HEAD commit
    pub head: Option<String>,
}

/// Options for [`crate::catalog::Cataloger::create_entry`].
#[derive(Debug, Clone, Default)]
pub struct CreateEntryParams {
    /// Content identity used for deduplication. Entries created with the same
    /// id in one repository share the physical address of the first of them.
    pub dedup_id: Option<String>,
}

impl CreateEntryParams {
    pub fn with_dedup_id(dedup_id: impl Into<String>) -> Self {
        Self { dedup_id: Some(dedup_id.into()) }
    }
}

/// Options for [`crate::catalog::Cataloger::get_entry`]. Currently empty.
#[derive(Debug, Clone, Default)]
pub struct GetEntryParams {}
