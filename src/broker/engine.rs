//! Broker engine
//!
//! This module contains the broadcast core responsible for:
//! - accepting published messages through a rendezvous hand-off
//! - forwarding each message, in order, to a snapshot of the registered subscribers
//! - opening and closing subscriptions
//! - stopping cleanly on an explicit shutdown signal
//!
//! Concurrency and usage notes:
//! - `Broker` is a cheap, cloneable handle. It is constructed once at startup
//!   with `Broker::start`, which also spawns the broadcaster task, and is then
//!   handed to every request handler.
//! - The broadcaster is a single sequential task. A publish returns once the
//!   broadcaster has taken the message and fixed the snapshot for its round.
//! - Delivery to each subscriber is a blocking hand-off into its bounded
//!   channel. A subscriber that stops reading holds up the rest of the round
//!   and every publish queued behind it. There is no per-subscriber timeout.
//!   Deregistering a subscriber releases a round blocked on it.
//! - Once stopped the broker never restarts; publishes fail with
//!   `BrokerError::Unavailable`.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broker::message::Message;
use crate::broker::registry::SubscriberRegistry;
use crate::client::{Subscriber, SubscriberId, Subscription};
use crate::config::BrokerSettings;
use crate::utils::error::BrokerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Running,
    Stopped,
}

/// A published message waiting for the broadcaster, plus the signal the
/// broadcaster fires once it has accepted it.
#[derive(Debug)]
struct Envelope {
    message: Message,
    accepted: oneshot::Sender<()>,
}

#[derive(Debug, Clone)]
pub struct Broker {
    registry: Arc<SubscriberRegistry>,
    inbound: mpsc::Sender<Envelope>,
    state: Arc<watch::Sender<BrokerState>>,
    delivery_buffer: usize,
}

impl Broker {
    /// Capacity of the inbound queue. Together with the acceptance signal this
    /// makes `publish` a rendezvous: at most one message waits for the broadcaster.
    const INBOUND_CAPACITY: usize = 1;

    /// Build the broker and spawn its broadcaster task on the current runtime.
    pub fn start(settings: &BrokerSettings) -> (Self, JoinHandle<()>) {
        let registry = Arc::new(SubscriberRegistry::new());
        let (inbound, inbound_rx) = mpsc::channel(Self::INBOUND_CAPACITY);
        let (state, state_rx) = watch::channel(BrokerState::Running);

        let broker = Self {
            registry: registry.clone(),
            inbound,
            state: Arc::new(state),
            delivery_buffer: settings.delivery_buffer.max(1),
        };

        let handle = tokio::spawn(run_broadcast_loop(inbound_rx, registry, state_rx));
        (broker, handle)
    }

    /// Hand a message to the broadcaster.
    ///
    /// Waits until the broadcaster has dequeued the message. Callers are
    /// expected to have validated sender identity and content already.
    pub async fn publish(&self, message: Message) -> Result<(), BrokerError> {
        if !self.is_running() {
            return Err(BrokerError::Unavailable);
        }

        let (accepted, ack) = oneshot::channel();
        self.inbound
            .send(Envelope { message, accepted })
            .await
            .map_err(|_| BrokerError::Unavailable)?;

        // dropped unanswered if the broadcaster stopped before taking it
        ack.await.map_err(|_| BrokerError::Unavailable)
    }

    /// Register a fresh subscriber and return its handle.
    ///
    /// The subscriber is registered before this returns, so it receives every
    /// message whose round starts afterwards.
    pub fn open_subscription(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.delivery_buffer);
        let subscriber = Subscriber::new(tx);
        let id = subscriber.id;

        self.registry.register(subscriber);
        debug!("Registered subscriber {id}");

        Subscription::new(id, rx, self.registry.clone())
    }

    /// Remove a subscriber. A no-op if it is already gone.
    pub fn close_subscription(&self, id: &SubscriberId) -> bool {
        self.registry.deregister(id)
    }

    /// Stop the broadcaster. Terminal.
    pub fn shutdown(&self) {
        let previous = self.state.send_replace(BrokerState::Stopped);
        if previous == BrokerState::Running {
            info!("Broadcaster shutdown requested");
        }
    }

    pub fn state(&self) -> BrokerState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == BrokerState::Running
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub(crate) fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }
}

async fn run_broadcast_loop(
    mut inbound: mpsc::Receiver<Envelope>,
    registry: Arc<SubscriberRegistry>,
    mut state: watch::Receiver<BrokerState>,
) {
    info!("Broadcaster started");

    loop {
        let envelope = tokio::select! {
            biased;
            _ = stopped(&mut state) => break,
            envelope = inbound.recv() => envelope,
        };

        // every Broker handle is gone
        let Some(Envelope { message, accepted }) = envelope else {
            break;
        };

        let snapshot = registry.snapshot();
        if accepted.send(()).is_err() {
            // the publisher gave up waiting; its message is still broadcast
            debug!("Publisher went away before acceptance");
        }

        tokio::select! {
            biased;
            _ = stopped(&mut state) => {
                warn!("Shutdown interrupted a broadcast round");
                break;
            }
            _ = deliver(&message, snapshot) => {}
        }
    }

    // queued envelopes are dropped with the receiver, failing their publishers
    inbound.close();
    info!("Broadcaster stopped");
}

/// One broadcast round: a blocking hand-off to each subscriber in turn.
async fn deliver(message: &Message, snapshot: Vec<Subscriber>) {
    debug!(
        "Broadcasting {} bytes to {} subscribers",
        message.len(),
        snapshot.len()
    );

    for subscriber in snapshot {
        tokio::select! {
            biased;
            _ = subscriber.cancelled() => {
                debug!("Skipping deregistered subscriber {}", subscriber.id);
            }
            sent = subscriber.sender.send(message.clone()) => {
                if sent.is_err() {
                    // session ended after the snapshot was taken
                    debug!("Skipping stale subscriber {}", subscriber.id);
                }
            }
        }
    }
}

/// Resolves once the broker is stopped or every handle to it has been dropped.
async fn stopped(state: &mut watch::Receiver<BrokerState>) {
    let _ = state.wait_for(|s| *s == BrokerState::Stopped).await;
}
