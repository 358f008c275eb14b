//! Transaction handles and operation contexts.
//!
//! Every catalog operation runs as exactly one SQLite transaction. This
//! module defines the two values that travel with it:
//!
//! ```text
//! ┌──────────────┐   checked before BEGIN, between statements,
//! │   Context    │   and right before COMMIT
//! │ cancel/dline │──────────────────────────────┐
//! └──────────────┘                              │
//!                                               ▼
//!                                      ┌─────────────────┐
//!                                      │       Tx        │
//!                                      │ (open SQL txn,  │──► storage helpers
//!                                      │  id, start time)│──► post-commit hooks
//!                                      └─────────────────┘
//! ```
//!
//! A transaction that is dropped without committing rolls back, so any
//! error, whether from SQL, a hook, or an interrupt, leaves no trace.

mod context;
mod tx;

pub use context::{Context, Interrupt};
pub use tx::{Tx, TxMode};
