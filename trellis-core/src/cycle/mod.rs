//! Refresh Cycles
//!
//! A host runs two chained cycles. The *update* cycle accumulates dirty
//! boundaries and renders them; the *render* cycle accumulates the resulting
//! change batches and applies them to the output tree.
//!
//! # Timeouts
//!
//! Each request carries a [`Timeout`]. `Immediate` runs the phase inline with
//! the call that requested it, `After(ms)` defers it, and `Keep` leaves an
//! armed cycle as it is (or arms an idle one with the host default). A
//! request can only ever bring an armed deadline closer.
//!
//! # Time
//!
//! Deadlines are plain milliseconds read from a [`Clock`]. [`ManualClock`]
//! is advanced by hand; [`TokioClock`] follows `tokio::time`, so paused test
//! time drives it deterministically.

mod pending;
mod refresh;

pub use refresh::{RefreshCycle, RefreshHandle};

pub(crate) use pending::{DirtySet, RenderQueue};

use std::cell::Cell;
use std::rc::Rc;

use serde::Deserialize;

/// When a requested phase should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Timeout {
    /// Inline with the requesting call.
    Immediate,
    /// After the given number of milliseconds.
    After(u64),
    /// Leave the current schedule alone; arm idle cycles with the default.
    #[default]
    Keep,
}

impl Timeout {
    /// Map a settings value: `None` means immediate.
    pub fn from_setting(ms: Option<u64>) -> Self {
        match ms {
            None => Timeout::Immediate,
            Some(ms) => Timeout::After(ms),
        }
    }
}

/// Millisecond time source for cycle deadlines.
pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Move the clock to `ms` if it can be moved by hand.
    fn skip_to(&self, _ms: u64) {}
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.0.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }

    fn skip_to(&self, ms: u64) {
        if ms > self.0.get() {
            self.0.set(ms);
        }
    }
}

/// Milliseconds since creation, measured with `tokio::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
