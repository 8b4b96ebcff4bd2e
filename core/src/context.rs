//! Cancellation and deadlines for cache and driver operations.
//!
//! A [`Context`] is cheap to clone and is threaded through every `_context`
//! operation. The cache checks it before taking a lock, while waiting for one,
//! before calling into the driver and again after a statement was prepared.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Longest single wait slice used when polling a lock on behalf of a context.
const POLL_SLICE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Default)]
pub struct Context {
    canceled: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

/// Cancels the [`Context`] it was created with, and every context derived from it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Context {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A cancellable context and the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Self {
            canceled: Some(flag.clone()),
            deadline: None,
        };
        (ctx, CancelHandle { flag })
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            canceled: None,
            deadline: Some(deadline),
        }
    }

    /// Derives a context that shares this one's cancellation and expires at
    /// the earlier of the two deadlines.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            canceled: self.canceled.clone(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if this context can never end.
    pub fn is_background(&self) -> bool {
        self.canceled.is_none() && self.deadline.is_none()
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The error describing why the context ended, if it has.
    ///
    /// Cancellation wins over an expired deadline.
    pub fn err(&self) -> Option<Error> {
        if self
            .canceled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
        {
            return Some(Error::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<()> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// How long a blocked caller may wait before re-checking this context.
    pub fn poll_slice(&self) -> Duration {
        match self.remaining() {
            Some(left) => left.min(POLL_SLICE),
            None => POLL_SLICE,
        }
    }
}
