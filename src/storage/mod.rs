//! storage layer for the cataloger
//!
//! This module owns the relational representation of repositories, branches,
//! commits and entries. The catalog layer above it composes these row
//! operations into atomic catalog operations and never writes SQL itself.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │   (connection, one transaction per operation, schema)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  Tx
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │repositories │       │  branches   │       │   entries   │
//!  │ (counters)  │       │  (lineage)  │       │  (staging,  │
//!  └─────────────┘       └─────────────┘       │  committed) │
//!         │                     │              └─────────────┘
//!         └──────────┬──────────┘                     │
//!                    ▼                                ▼
//!             ┌─────────────┐                  ┌─────────────┐
//!             │   commits   │                  │   listing   │
//!             │  (history)  │                  │   (merge)   │
//!             └─────────────┘                  └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cataloger::config::CatalogerConfig;
//! use cataloger::storage::{Store, StorageResult};
//! use cataloger::transaction::Context;
//!
//! let store = Store::open(&CatalogerConfig::in_memory())?;
//! let count: i64 = store.read(&Context::background(), "count", |tx| -> StorageResult<i64> {
//!     Ok(tx.sql().query_row("SELECT COUNT(*) FROM repositories", [], |r| r.get(0))?)
//! })?;
//! ```

pub(crate) mod branches;
pub(crate) mod commits;
pub(crate) mod entries;
mod errors;
pub(crate) mod listing;
pub(crate) mod repositories;
mod schema;
mod store;
mod types;

pub use errors::{StorageError, StorageResult};
pub use schema::SCHEMA_VERSION;
pub use store::{OperationError, Store};
pub use types::{BranchName, CommitId, InvalidNameError, Metadata, RepositoryName};

pub(crate) use types::{BranchId, RepositoryId};
