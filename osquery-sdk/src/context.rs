//! Deadline- and cancellation-aware call context.
//!
//! Every RPC and plugin call takes a [`Context`]. A context carries an
//! optional deadline and a cancellation channel; waiters observe cancellation
//! by selecting on [`Context::done`] alongside their own work. Cancellation is
//! level-triggered and sticky.

use std::convert::Infallible;
use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, never, Receiver, Sender};

/// Why a context stopped being live.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContextError {
    /// The context was cancelled through its [`CancelHandle`].
    Canceled,
    /// The context's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Canceled => write!(f, "context canceled"),
            ContextError::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl std::error::Error for ContextError {}

/// A cancellation scope handed to blocking operations.
///
/// `Context` is cheap to clone; clones share the same cancellation channel
/// and deadline.
#[derive(Clone)]
pub struct Context {
    deadline: Option<Instant>,
    done: Receiver<Infallible>,
}

/// Cancels the paired [`Context`].
///
/// Calling [`CancelHandle::cancel`] or dropping the last handle cancels the
/// context. Hold on to the handle for as long as the work should be allowed
/// to proceed.
pub struct CancelHandle {
    _keep_open: Sender<Infallible>,
}

impl CancelHandle {
    /// Cancels the context now. Dropping the handle has the same effect.
    pub fn cancel(self) {}
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Context {
        Context {
            deadline: None,
            done: never(),
        }
    }

    /// A cancellable context with no deadline.
    pub fn with_cancel() -> (Context, CancelHandle) {
        let (keep_open, done) = bounded(0);
        (
            Context {
                deadline: None,
                done,
            },
            CancelHandle {
                _keep_open: keep_open,
            },
        )
    }

    /// A cancellable context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> (Context, CancelHandle) {
        let (keep_open, done) = bounded(0);
        (
            Context {
                deadline: Some(Instant::now() + timeout),
                done,
            },
            CancelHandle {
                _keep_open: keep_open,
            },
        )
    }

    /// The instant after which this context should be considered dead, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// A channel that becomes ready (by disconnecting) once the context is
    /// cancelled. Select on this next to the guarded work.
    pub(crate) fn done(&self) -> &Receiver<Infallible> {
        &self.done
    }

    /// Reports why the context is no longer live, or `None` while it still is.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    fn is_cancelled(&self) -> bool {
        // A zero-capacity channel can never transfer a value; try_recv only
        // reports Disconnected once every CancelHandle is gone.
        matches!(
            self.done.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline)
            .field("err", &self.err())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn background_is_never_done() {
        let ctx = Context::background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.err().is_none());
    }

    #[test]
    fn cancel_marks_context_done() {
        let (ctx, cancel) = Context::with_cancel();
        assert!(ctx.err().is_none());
        cancel.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn dropping_handle_cancels() {
        let (ctx, cancel) = Context::with_cancel();
        drop(cancel);
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn deadline_expiry_is_reported() {
        let (ctx, _cancel) = Context::with_timeout(Duration::from_millis(5));
        assert!(ctx.err().is_none());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn clones_share_cancellation() {
        let (ctx, cancel) = Context::with_cancel();
        let clone = ctx.clone();
        cancel.cancel();
        assert_eq!(clone.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn explicit_cancel_wins_over_deadline() {
        let (ctx, cancel) = Context::with_timeout(Duration::from_millis(5));
        cancel.cancel();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }
}
