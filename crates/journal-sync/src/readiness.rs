//! One-way latch for the backend readiness handshake.
//!
//! Readiness can be observed twice: by the poll issued when the event
//! bridge subscribes, and by a `backend-ready` push. Whichever arrives first
//! flips the latch; the other is a no-op.

use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info};

type ReadyCallback = Box<dyn FnOnce() + Send>;

/// What observed readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyTrigger {
    InitialPoll,
    Event,
}

pub struct ReadinessGate {
    ready: watch::Sender<bool>,
    callbacks: Mutex<Vec<ReadyCallback>>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            ready,
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Run `callback` once the gate is ready, or right away if it already is.
    /// Every registered callback runs exactly once.
    pub fn on_ready(&self, callback: impl FnOnce() + Send + 'static) {
        let mut pending = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_ready() {
            drop(pending);
            callback();
            return;
        }
        pending.push(Box::new(callback));
    }

    /// Flip the gate. Returns `true` only for the call that performed the
    /// transition; that call also runs the pending callbacks.
    pub fn mark_ready(&self, trigger: ReadyTrigger) -> bool {
        let flipped = self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
        if !flipped {
            debug!(?trigger, "backend already marked ready");
            return false;
        }

        info!(?trigger, "backend ready");
        let callbacks =
            std::mem::take(&mut *self.callbacks.lock().unwrap_or_else(PoisonError::into_inner));
        for callback in callbacks {
            callback();
        }
        true
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
