//! Caller-supplied operation context.
//!
//! Every catalog operation takes a [`Context`]. Cancelling it, or letting its
//! deadline pass, aborts the operation at the next probe point and rolls
//! back whatever transaction was open.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// why an operation was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Cancelled => write!(f, "context cancelled"),
            Interrupt::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl std::error::Error for Interrupt {}

/// Cancellation signal and optional deadline for one or more operations.
///
/// Cloning is cheap and clones share the cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// a context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// derive a context that also expires after `timeout`.
    ///
    /// The tighter of the existing and the new deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// derive a context that also expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    /// cancel this context and every clone of it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// the deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// the reason this context is done, if it is
    pub fn interrupt(&self) -> Option<Interrupt> {
        probe(&self.cancelled, self.deadline)
    }

    /// fail with the interrupt reason if the context is done
    pub fn check(&self) -> Result<(), Interrupt> {
        match self.interrupt() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// a `'static` probe suitable for SQLite's progress handler.
    ///
    /// Returns true when the running statement should be aborted.
    pub(crate) fn probe(&self) -> impl FnMut() -> bool + Send + std::panic::RefUnwindSafe + 'static {
        let cancelled = Arc::clone(&self.cancelled);
        let deadline = self.deadline;
        move || probe(&cancelled, deadline).is_some()
    }
}

fn probe(cancelled: &AtomicBool, deadline: Option<Instant>) -> Option<Interrupt> {
    if cancelled.load(Ordering::SeqCst) {
        return Some(Interrupt::Cancelled);
    }
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Some(Interrupt::DeadlineExceeded),
        _ => None,
    }
}
