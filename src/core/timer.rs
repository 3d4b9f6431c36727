use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};

use crate::prelude::*;

/// Handle of a scheduled one-shot timer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub struct TimerId(u64);

/// One-shot timer capability.
///
/// The owner gets the fired [`TimerId`] back through whatever channel the implementation
/// provides, and must be ready to receive ids it has already cancelled.
pub trait Timer {
    /// Schedule a one-shot timer which fires at the deadline.
    fn schedule(&mut self, deadline: DateTime<Utc>) -> TimerId;

    /// Cancel the timer.
    ///
    /// Cancelling a timer that has already fired or has never existed is a no-op.
    fn cancel(&mut self, id: TimerId);
}

/// Real timers on the Tokio runtime.
pub struct TokioTimer {
    next_id: u64,
    fired: mpsc::UnboundedSender<TimerId>,
    pending: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioTimer {
    /// Create the timer and the receiver of fired timer IDs.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (fired, receiver) = mpsc::unbounded_channel();
        (Self { next_id: 0, fired, pending: HashMap::new() }, receiver)
    }
}

impl Timer for TokioTimer {
    fn schedule(&mut self, deadline: DateTime<Utc>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        // Forget the finished ones:
        self.pending.retain(|_, handle| !handle.is_finished());

        let delay = (deadline - Utc::now()).to_std().unwrap_or_default();
        debug!(%id, ?delay, "scheduling…");
        let fired = self.fired.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = fired.send(id);
        });
        self.pending.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.pending.remove(&id) {
            debug!(%id, "cancelling…");
            handle.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for handle in self.pending.values() {
            handle.abort();
        }
    }
}

/// Virtual timers for replaying recorded samples, where the time is driven by the samples.
#[derive(Default)]
pub struct ReplayTimer {
    next_id: u64,
    pending: BTreeMap<TimerId, DateTime<Utc>>,
}

impl ReplayTimer {
    /// Take the earliest timer that is due at the specified time.
    pub fn pop_due(&mut self, until: DateTime<Utc>) -> Option<TimerId> {
        let (id, _) = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= until)
            .min_by_key(|(id, deadline)| (**deadline, **id))?;
        let id = *id;
        self.pending.remove(&id);
        Some(id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Timer for ReplayTimer {
    fn schedule(&mut self, deadline: DateTime<Utc>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, deadline);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.pending.remove(&id);
    }
}
