//! Cataloger - a Git-like versioning catalog for data lake objects
//!
//! This crate tracks file-like objects (path, physical address, checksum,
//! size, metadata) in repositories with branches and an immutable commit
//! history, stored in SQLite. Writes land in a per-branch staging area and
//! become history through atomic commits. Post-commit hooks can observe or
//! veto a commit inside its transaction.
//!
//! # Example
//!
//! ```no_run
//! use cataloger::catalog::{Cataloger, Entry};
//! use cataloger::config::CatalogerConfig;
//! use cataloger::transaction::Context;
//!
//! let cataloger = Cataloger::open(CatalogerConfig::new("./catalog.db")).unwrap();
//! let ctx = Context::background();
//!
//! cataloger.create_repository(&ctx, "lake", "s3://bucket/lake", "main").unwrap();
//! cataloger
//!     .create_entry(&ctx, "lake", "main", Entry::new("data/a.parquet", "s3://bucket/x1", "c0ffee", 1024), Default::default())
//!     .unwrap();
//! let log = cataloger
//!     .commit(&ctx, "lake", "main", "add a.parquet", "alice", Default::default())
//!     .unwrap();
//!
//! let entry = cataloger
//!     .get_entry(&ctx, "lake", &log.reference, "data/a.parquet", Default::default())
//!     .unwrap();
//! assert_eq!(entry.checksum, "c0ffee");
//! ```

pub mod catalog;
pub mod config;
pub mod storage;
pub mod transaction;

pub use catalog::{parse_ref, CatalogError, CatalogResult, Cataloger, CommitLog, Entry, Hooks, Ref};
pub use config::CatalogerConfig;
pub use transaction::{Context, Tx};
