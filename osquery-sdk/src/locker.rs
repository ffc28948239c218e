//! Time-bounded mutual exclusion for the shared osquery transport.
//!
//! The thrift socket interleaves request and response frames for a single
//! caller at a time; two concurrent writers corrupt the stream. A plain mutex
//! would serialize access but cannot be interrupted, so the locker is built on
//! a one-slot channel instead: acquiring selects over the free slot, the
//! caller's cancellation, and a timer.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::context::{Context, ContextError};

/// Errors surfaced while waiting for the transport slot.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum LockerError {
    /// No caller deadline was supplied and the default wait elapsed.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// The system-wide ceiling elapsed before the caller's own deadline.
    #[error("timeout after maximum of {0:?}")]
    MaxWaitTimeout(Duration),
    /// The caller's context was cancelled or its deadline passed.
    #[error("context canceled: {0}")]
    Canceled(ContextError),
}

pub struct Locker {
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
    // Wait bound when the context carries no deadline.
    default_timeout: Duration,
    // Absolute ceiling; overrides even longer caller deadlines.
    max_wait: Duration,
}

impl Locker {
    pub fn new(default_timeout: Duration, max_wait: Duration) -> Locker {
        let (slot_tx, slot_rx) = bounded(1);
        Locker {
            slot_tx,
            slot_rx,
            default_timeout,
            max_wait,
        }
    }

    /// Waits to become the sole holder of the transport slot.
    ///
    /// The wait is bounded by the shorter of the context deadline and
    /// `max_wait`, or by `default_timeout` when the context has no deadline.
    pub fn lock(&self, ctx: &Context) -> Result<(), LockerError> {
        // Assume most callers set a deadline and start from the ceiling.
        let (wait, timeout_error) = match ctx.deadline() {
            Some(_) => (self.max_wait, LockerError::MaxWaitTimeout(self.max_wait)),
            None => (self.default_timeout, LockerError::Timeout(self.default_timeout)),
        };

        // If the caller's deadline lands before our own timer, the timer slot
        // doubles as the deadline and expiry reports a context error instead.
        let now = Instant::now();
        let mut timeout = wait;
        let mut deadline_first = false;
        if let Some(deadline) = ctx.deadline() {
            let remaining = deadline.saturating_duration_since(now);
            if remaining < timeout {
                timeout = remaining;
                deadline_first = true;
            }
        }

        crossbeam_channel::select! {
            send(self.slot_tx, ()) -> outcome => match outcome {
                Ok(()) => Ok(()),
                // All receivers gone; cannot happen while self is alive.
                Err(_) => Err(timeout_error),
            },
            recv(ctx.done()) -> _ => {
                Err(LockerError::Canceled(ctx.err().unwrap_or(ContextError::Canceled)))
            }
            default(timeout) => {
                if deadline_first {
                    Err(LockerError::Canceled(ContextError::DeadlineExceeded))
                } else {
                    Err(timeout_error)
                }
            }
        }
    }

    /// Releases the slot. Unlocking an unheld locker is a programmer error
    /// and panics, mirroring mutex discipline.
    pub fn unlock(&self) {
        if self.slot_rx.try_recv().is_err() {
            panic!("unlock of unlocked locker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    // Exercises the locker the way client RPCs do: take the slot, hold it for
    // the duration of the fake call, release it.
    struct ThingDoer {
        locker: Locker,
        successes: Mutex<u32>,
        errors: Mutex<Vec<String>>,
    }

    impl ThingDoer {
        fn new() -> ThingDoer {
            ThingDoer {
                locker: Locker::new(Duration::from_millis(100), Duration::from_millis(200)),
                successes: Mutex::new(0),
                errors: Mutex::new(Vec::new()),
            }
        }

        fn once(&self, ctx: &Context, hold: Duration) {
            match self.locker.lock(ctx) {
                Ok(()) => {
                    thread::sleep(hold);
                    *self.successes.lock().unwrap() += 1;
                    self.locker.unlock();
                }
                Err(err) => self.errors.lock().unwrap().push(err.to_string()),
            }
        }

        fn run_parallel(&self, parallelism: u32, hold: Duration, ctx_timeout: Option<Duration>) {
            thread::scope(|scope| {
                for _ in 0..parallelism {
                    scope.spawn(|| {
                        let (ctx, _cancel) = match ctx_timeout {
                            Some(timeout) => {
                                let (ctx, cancel) = Context::with_timeout(timeout);
                                (ctx, Some(cancel))
                            }
                            None => (Context::background(), None),
                        };
                        self.once(&ctx, hold);
                    });
                }
            });
        }
    }

    #[test]
    fn all_acquirers_succeed_within_deadline() {
        let doer = ThingDoer::new();
        doer.run_parallel(5, Duration::from_millis(1), Some(Duration::from_millis(10)));

        assert_eq!(*doer.successes.lock().unwrap(), 5);
        assert!(doer.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn default_timeout_without_deadline() {
        let doer = ThingDoer::new();
        doer.run_parallel(5, Duration::from_millis(150), None);

        assert_eq!(*doer.successes.lock().unwrap(), 1);
        let errors = doer.errors.lock().unwrap();
        assert_eq!(errors.len(), 4);
        for err in errors.iter() {
            assert!(err.contains("timeout after 100ms"), "unexpected error: {err}");
        }
    }

    #[test]
    fn max_wait_overrides_long_deadline() {
        let doer = ThingDoer::new();
        doer.run_parallel(5, Duration::from_millis(250), Some(Duration::from_secs(10)));

        assert_eq!(*doer.successes.lock().unwrap(), 1);
        let errors = doer.errors.lock().unwrap();
        assert_eq!(errors.len(), 4);
        for err in errors.iter() {
            assert!(
                err.contains("timeout after maximum of 200ms"),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn short_deadline_reports_context_error() {
        let doer = ThingDoer::new();
        doer.run_parallel(5, Duration::from_millis(150), Some(Duration::from_millis(10)));

        assert_eq!(*doer.successes.lock().unwrap(), 1);
        let errors = doer.errors.lock().unwrap();
        assert_eq!(errors.len(), 4);
        for err in errors.iter() {
            assert!(
                err.contains("context canceled: context deadline exceeded"),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn cancellation_interrupts_the_wait() {
        let locker = Locker::new(Duration::from_secs(5), Duration::from_secs(10));
        let background = Context::background();
        locker.lock(&background).unwrap();

        let (ctx, cancel) = Context::with_cancel();
        let started = Instant::now();
        let waiter = thread::spawn(move || locker.lock(&ctx));
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();

        let result = waiter.join().unwrap();
        assert_eq!(result, Err(LockerError::Canceled(ContextError::Canceled)));
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "cancellation should interrupt the wait promptly"
        );
    }

    #[test]
    fn needless_unlock_panics() {
        let locker = Locker::new(Duration::from_millis(100), Duration::from_millis(200));
        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| locker.unlock()));
        assert!(result.is_err());
    }

    #[test]
    fn double_unlock_panics_on_second_call() {
        let locker = Locker::new(Duration::from_millis(100), Duration::from_millis(200));
        locker.lock(&Context::background()).unwrap();
        locker.unlock();
        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| locker.unlock()));
        assert!(result.is_err());
    }

    #[test]
    fn chaos() {
        let doer = ThingDoer::new();
        thread::scope(|scope| {
            for i in 0..50 {
                let doer = &doer;
                scope.spawn(move || {
                    let hold = Duration::from_millis((i * 7) % 100);
                    if i % 5 == 0 {
                        doer.once(&Context::background(), hold);
                    } else {
                        let (ctx, _cancel) =
                            Context::with_timeout(Duration::from_millis((i * 13) % 500));
                        doer.once(&ctx, hold);
                    }
                });
            }
        });

        assert!(*doer.successes.lock().unwrap() >= 1);
        assert!(!doer.errors.lock().unwrap().is_empty());
    }
}
