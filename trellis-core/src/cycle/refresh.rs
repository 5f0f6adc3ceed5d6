//! The refresh-cycle state machine.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use tokio::sync::oneshot;

use super::Timeout;
use crate::error::HostError;

/// When an armed cycle fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Armed {
    Idle,
    /// Inline with the current call.
    Now,
    /// At the given clock time.
    At(u64),
}

impl Armed {
    fn tighten(self, other: Armed) -> Armed {
        match (self, other) {
            (Armed::Idle, x) | (x, Armed::Idle) => x,
            (Armed::Now, _) | (_, Armed::Now) => Armed::Now,
            (Armed::At(a), Armed::At(b)) => Armed::At(a.min(b)),
        }
    }
}

/// One deferred phase with its pending accumulator.
///
/// The cycle does not run anything itself. The host asks it whether it is
/// due, takes the pending work, runs the phase, and resolves the waiters.
#[derive(Debug)]
pub struct RefreshCycle<P> {
    name: &'static str,
    pending: P,
    armed: Armed,
    running: bool,
    default_timeout: Option<u64>,
    waiters: Vec<oneshot::Sender<Result<(), HostError>>>,
}

impl<P: Default> RefreshCycle<P> {
    /// `default_timeout` is used when an idle cycle is armed with
    /// [`Timeout::Keep`]; `None` means immediate.
    pub fn new(name: &'static str, default_timeout: Option<u64>) -> Self {
        Self {
            name,
            pending: P::default(),
            armed: Armed::Idle,
            running: false,
            default_timeout,
            waiters: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pending(&self) -> &P {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut P {
        &mut self.pending
    }

    /// Take the accumulated work, leaving an empty accumulator.
    pub fn take_pending(&mut self) -> P {
        std::mem::take(&mut self.pending)
    }

    pub fn set_default_timeout(&mut self, timeout: Option<u64>) {
        self.default_timeout = timeout;
    }

    /// Arm the cycle. Never pushes an armed deadline further out.
    pub fn arm(&mut self, timeout: Timeout, now: u64) {
        let requested = match timeout {
            Timeout::Immediate => Armed::Now,
            Timeout::After(ms) => Armed::At(now.saturating_add(ms)),
            Timeout::Keep if self.armed != Armed::Idle => return,
            Timeout::Keep => match self.default_timeout {
                None => Armed::Now,
                Some(ms) => Armed::At(now.saturating_add(ms)),
            },
        };
        self.armed = self.armed.tighten(requested);
    }

    pub fn disarm(&mut self) {
        self.armed = Armed::Idle;
    }

    pub fn is_armed(&self) -> bool {
        self.armed != Armed::Idle
    }

    /// Armed to run inline with the current call.
    pub fn is_immediate(&self) -> bool {
        self.armed == Armed::Now
    }

    /// Clock time at which the cycle fires; `Some(0)` when immediate.
    pub fn deadline(&self) -> Option<u64> {
        match self.armed {
            Armed::Idle => None,
            Armed::Now => Some(0),
            Armed::At(t) => Some(t),
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        self.deadline().is_some_and(|t| t <= now)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Mark the start of the phase; the cycle is disarmed.
    pub fn begin(&mut self) {
        self.armed = Armed::Idle;
        self.running = true;
    }

    /// Mark the end of the phase.
    pub fn finish(&mut self) {
        self.running = false;
    }

    /// Whether the cycle has work scheduled or in progress.
    pub fn is_busy(&self) -> bool {
        self.running || self.is_armed()
    }

    /// A handle that resolves after the next run of this phase.
    pub fn waiter(&mut self) -> RefreshHandle {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        RefreshHandle { rx: Some(rx) }
    }

    /// Resolve everyone waiting for this phase.
    pub fn resolve(&mut self) {
        for tx in self.waiters.drain(..) {
            let _ = tx.send(Ok(()));
        }
    }

    /// Drop all waiters and pending work; handles resolve to
    /// [`HostError::Cancelled`].
    pub fn cancel(&mut self) {
        self.waiters.clear();
        self.pending = P::default();
        self.armed = Armed::Idle;
    }
}

/// Completion of one refresh phase.
#[derive(Debug)]
#[must_use = "a refresh handle does nothing unless awaited"]
pub struct RefreshHandle {
    rx: Option<oneshot::Receiver<Result<(), HostError>>>,
}

impl RefreshHandle {
    /// A handle that is already resolved.
    pub fn ready() -> Self {
        Self { rx: None }
    }
}

impl Future for RefreshHandle {
    type Output = Result<(), HostError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        match rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(HostError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
