//! Subscription handle
//!
//! A `Subscription` is what a session gets back from
//! `Broker::open_subscription`: the receiving half of its delivery channel
//! plus the id it was registered under.
//!
//! Deregistration is tied to ownership. Dropping the handle removes the
//! subscriber from the registry, which covers every way a session can end:
//! normal completion, the client disconnecting (the response stream is
//! dropped), an error, or a panic unwinding through the session.

use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

use crate::broker::message::Message;
use crate::broker::registry::SubscriberRegistry;
use crate::client::SubscriberId;

#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: Receiver<Message>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        receiver: Receiver<Message>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            id,
            receiver,
            registry,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next delivered message.
    ///
    /// Returns `None` once the subscriber has been removed from the registry
    /// and no in-flight round still holds its sender.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Deregister and consume the handle.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.deregister(&self.id) {
            debug!("Deregistered subscriber {}", self.id);
        }
    }
}
