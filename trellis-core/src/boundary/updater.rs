//! Updater handles.
//!
//! An [`Updater`] is the way code outside the engine (event handlers, timers,
//! lifecycle hooks) asks a boundary to change. Requests go into the host's
//! mailbox first, then the host is poked.
//!
//! # Re-entrancy
//!
//! If the host is idle, the poke drains the mailbox and runs any phase armed
//! as immediate before `send` returns. If the host is in the middle of a
//! phase (the request came from a hook or a render), the poke finds it
//! borrowed and returns: the running phase drains the mailbox itself before
//! it picks the next dirty boundary, so the request joins the in-progress
//! accumulator instead of re-entering the drain loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use super::BoundaryId;
use crate::cycle::Timeout;
use crate::value::Props;

/// Something that can process the mailbox when it is not busy.
pub(crate) trait Trigger {
    fn poke(&self);
}

#[cfg(test)]
struct NoTrigger;

#[cfg(test)]
impl Trigger for NoTrigger {
    fn poke(&self) {}
}

/// A queued state change.
#[derive(Debug, Clone)]
pub(crate) enum Request {
    /// Merge a patch into the next state.
    Patch(Props),
    /// Replace the next state.
    Replace(Props),
    /// Re-render without a state change.
    Update { force: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub(crate) target: BoundaryId,
    pub(crate) request: Request,
    pub(crate) timeout: Timeout,
}

/// Requests waiting for the host.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    queue: VecDeque<Envelope>,
}

impl Mailbox {
    pub(crate) fn push(&mut self, envelope: Envelope) {
        self.queue.push_back(envelope);
    }

    pub(crate) fn take(&mut self) -> Vec<Envelope> {
        self.queue.drain(..).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Shared mailbox plus the host it belongs to.
#[derive(Clone)]
pub(crate) struct Channel {
    pub(crate) mailbox: Rc<RefCell<Mailbox>>,
    pub(crate) trigger: Weak<dyn Trigger>,
}

impl Channel {
    pub(crate) fn new(trigger: Weak<dyn Trigger>) -> Self {
        Self {
            mailbox: Rc::default(),
            trigger,
        }
    }

    /// A channel no host listens on.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(Weak::<NoTrigger>::new())
    }
}

/// Cloneable handle for requesting updates of one boundary.
#[derive(Clone)]
pub struct Updater {
    id: BoundaryId,
    channel: Channel,
}

impl Updater {
    pub(crate) fn new(id: BoundaryId, channel: Channel) -> Self {
        Self { id, channel }
    }

    #[cfg(test)]
    pub(crate) fn detached(id: BoundaryId) -> Self {
        Self::new(id, Channel::detached())
    }

    /// Get the target boundary's ID.
    pub fn id(&self) -> BoundaryId {
        self.id
    }

    /// Merge `patch` into the state, using the host's default timeout.
    pub fn set_state(&self, patch: Props) {
        self.send(Request::Patch(patch), Timeout::Keep);
    }

    pub fn set_state_with(&self, patch: Props, timeout: Timeout) {
        self.send(Request::Patch(patch), timeout);
    }

    pub fn replace_state(&self, state: Props, timeout: Timeout) {
        self.send(Request::Replace(state), timeout);
    }

    /// Re-run the update decision without changing state.
    pub fn update(&self, timeout: Timeout) {
        self.send(Request::Update { force: false }, timeout);
    }

    /// Re-render, bypassing the update decision.
    pub fn force_update(&self, timeout: Timeout) {
        self.send(Request::Update { force: true }, timeout);
    }

    fn send(&self, request: Request, timeout: Timeout) {
        self.channel.mailbox.borrow_mut().push(Envelope {
            target: self.id,
            request,
            timeout,
        });
        if let Some(trigger) = self.channel.trigger.upgrade() {
            trigger.poke();
        }
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Updater").field(&self.id).finish()
    }
}
