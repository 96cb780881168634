//! Subscriber registry
//!
//! The registry is the authoritative record of which subscribers should
//! receive forthcoming messages. It is the only state touched from more than
//! one task: sessions add and remove themselves while the broadcaster takes
//! snapshots.
//!
//! Concurrency note: the map sits behind a `std::sync::Mutex` that is held
//! only long enough to mutate it or to clone its senders into a snapshot. It
//! is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::client::{Subscriber, SubscriberId};

#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. It takes part in every broadcast round whose
    /// snapshot is taken after this call returns.
    pub fn register(&self, subscriber: Subscriber) {
        self.lock().insert(subscriber.id, subscriber);
    }

    /// Remove a subscriber and cancel any delivery still waiting on it.
    /// Returns `false` if it was already gone.
    pub fn deregister(&self, id: &SubscriberId) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(subscriber) => {
                subscriber.cancel();
                true
            }
            None => false,
        }
    }

    /// Copy of the current subscriber set for a single broadcast round.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // No code path can leave the map half-updated, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
