use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tokio::sync::watch;
use uuid::Uuid;

use crate::broker::message::Message;

pub type SubscriberId = Uuid;

/// The broadcaster's side of one connected subscriber.
///
/// Holds the sending half of the subscriber-exclusive delivery channel and a
/// flag raised once the subscriber is deregistered. The `id` is generated on
/// creation and is only used as the registry key.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub sender: Sender<Message>,
    closed: Arc<watch::Sender<bool>>,
}

impl Subscriber {
    pub fn new(sender: Sender<Message>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            sender,
            closed: Arc::new(closed),
        }
    }

    /// Mark the subscriber as gone. Every clone observes it, including
    /// the ones held by in-flight broadcast rounds.
    pub fn cancel(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }
}
