//! Interrupt a run between operations.

use futures::{channel::oneshot, future::Shared, FutureExt};
use std::time::{Duration, Instant};

/// A one-time broadcast observed by every run of a session.
///
/// Unlike a future that must be awaited, a [Signal] is polled without blocking at each
/// operation boundary (see [Interrupt::fired]).
#[derive(Clone)]
pub struct Signal {
    inner: Shared<oneshot::Receiver<i32>>,
}

impl Signal {
    /// Returns the value the [Signaler] resolved with, if it has been signaled.
    ///
    /// Dropping a [Signaler] without signaling never resolves the [Signal].
    pub fn value(&self) -> Option<i32> {
        self.inner.clone().now_or_never()?.ok()
    }
}

/// Resolves a [Signal] exactly once.
pub struct Signaler {
    tx: oneshot::Sender<i32>,
}

impl Signaler {
    /// Create a new [Signaler].
    ///
    /// Returns a [Signaler] and a [Signal] that will resolve when [Signaler::signal] is called.
    pub fn new() -> (Self, Signal) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, Signal { inner: rx.shared() })
    }

    /// Resolve all [Signal]s associated with this [Signaler].
    pub fn signal(self, value: i32) {
        let _ = self.tx.send(value);
    }
}

/// Conditions under which a run stops at the next yield point.
#[derive(Clone, Default)]
pub struct Interrupt {
    signal: Option<Signal>,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// Create an [Interrupt] that never fires.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire once `signal` resolves.
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Fire once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fire once `timeout` has elapsed from now.
    ///
    /// A timeout too large to represent never fires.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Returns `true` if the run should stop.
    pub fn fired(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        self.signal
            .as_ref()
            .is_some_and(|signal| signal.value().is_some())
    }
}
