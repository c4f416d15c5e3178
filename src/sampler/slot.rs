//! Single-slot, latest-value-wins hand-off between the sampling task and its consumer.
//!
//! The producer never waits: publishing into an occupied slot replaces the stale
//! value. At most one sample is ever pending.

use super::sample::UtilizationSample;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;

/// Outcome of [`SamplePublisher::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The slot was empty.
    Stored,
    /// An unconsumed older sample was discarded.
    Replaced,
    /// The slot is closed; the sample was dropped.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no sample pending")]
    Empty,
    #[error("sample slot closed")]
    Closed,
}

#[derive(Debug, Default)]
struct State {
    value: Option<UtilizationSample>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

impl Shared {
    // The guarded data is a plain value; a panic while holding the lock cannot
    // leave it half-written.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected publisher/receiver pair.
pub fn channel() -> (SamplePublisher, SampleReceiver) {
    let shared = Arc::new(Shared::default());
    (
        SamplePublisher {
            shared: Arc::clone(&shared),
        },
        SampleReceiver { shared },
    )
}

/// Producing half. Dropping it closes the slot.
#[derive(Debug)]
pub struct SamplePublisher {
    shared: Arc<Shared>,
}

impl SamplePublisher {
    /// Store `sample`, replacing any pending one. Never blocks on the consumer.
    pub fn publish(&self, sample: UtilizationSample) -> Publish {
        let outcome = {
            let mut st = self.shared.lock();
            if st.closed {
                return Publish::Closed;
            }
            match st.value.replace(sample) {
                Some(_) => Publish::Replaced,
                None => Publish::Stored,
            }
        };
        self.shared.notify.notify_one();
        outcome
    }

    /// Close the slot. A pending sample can still be received.
    pub fn close(&self) {
        {
            let mut st = self.shared.lock();
            if st.closed {
                return;
            }
            st.closed = true;
        }
        self.shared.notify.notify_one();
    }
}

impl Drop for SamplePublisher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consuming half.
#[derive(Debug)]
pub struct SampleReceiver {
    shared: Arc<Shared>,
}

impl SampleReceiver {
    /// Take the pending sample without waiting.
    pub fn try_recv(&mut self) -> Result<UtilizationSample, TryRecvError> {
        let mut st = self.shared.lock();
        match st.value.take() {
            Some(sample) => Ok(sample),
            None if st.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Wait for the next sample. Returns `None` once the slot is closed and drained.
    pub async fn recv(&mut self) -> Option<UtilizationSample> {
        loop {
            match self.try_recv() {
                Ok(sample) => return Some(sample),
                Err(TryRecvError::Closed) => return None,
                // notify_one stores a permit when nobody is waiting, so a publish
                // racing this check still wakes us.
                Err(TryRecvError::Empty) => self.shared.notify.notified().await,
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.shared.lock().value.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}
