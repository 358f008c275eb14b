//! The cataloger: repositories, branches, staging, commits and references.
//!
//! Every public operation lives on [`Cataloger`] and runs as exactly one
//! transaction against the [`crate::storage::Store`].
//!
//! ```text
//!   create_entry / delete_entry ──► staging (per branch)
//!                                      │
//!   commit ──► hooks ──► commit log ◄──┘ fold
//!                            │
//!   get_entry / list_entries ◄── reference ──► staging | HEAD | commit
//! ```

mod branches;
mod cataloger;
mod commit;
mod entries;
mod errors;
mod hooks;
mod log;
mod model;
mod reference;
mod repositories;

#[cfg(test)]
mod testutil;

pub use cataloger::Cataloger;
pub use errors::{CatalogError, CatalogResult};
pub use hooks::{HookError, Hooks, PostCommitHook};
pub use model::{Branch, CommitLog, CreateEntryParams, Entry, GetEntryParams, Repository};
pub use reference::{commit_reference, parse_ref, Ref, RefParseError};
