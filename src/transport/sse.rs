//! Server-Sent Events session
//!
//! Each `/sse` connection is backed by an `SseSession`. The session owns the
//! `Subscription` it opened, so when the HTTP layer drops the response body
//! (client gone, server shutting down, write error) the subscriber is
//! deregistered along with it.
//!
//! Framing follows the SSE text format: an `event:` line, one `data:` line per
//! payload line, and a blank line terminating the block.

use std::convert::Infallible;
use std::time::Duration;

use futures_util::Stream;
use futures_util::stream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::broker::message::Message;
use crate::client::Subscription;

/// Event label used for every delivered chat message.
pub const MESSAGE_EVENT: &str = "message";

/// SSE comment frame; ignored by clients, keeps idle proxies from closing the stream.
pub const KEEP_ALIVE_FRAME: &str = ": keep-alive\n\n";

/// Encode one event block.
///
/// Line endings in `data` are normalised to `\n` and every line gets its own
/// `data:` field, so multi-line payloads survive the trip intact.
pub fn format_sse(event: &str, data: &str) -> String {
    let normalised = data.replace("\r\n", "\n").replace('\r', "\n");

    let mut block = format!("event: {event}\n");
    for line in normalised.split('\n') {
        block.push_str("data: ");
        block.push_str(line);
        block.push('\n');
    }
    block.push('\n');
    block
}

#[derive(Debug)]
pub struct SseSession {
    username: String,
    subscription: Subscription,
    keep_alive: Option<Interval>,
}

impl SseSession {
    /// Register with the broker. The session is ready once this returns.
    pub fn open(broker: &Broker, username: String, keep_alive: Option<Duration>) -> Self {
        let subscription = broker.open_subscription();
        info!("NEW client connection: {username}");

        let keep_alive = keep_alive.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        Self {
            username,
            subscription,
            keep_alive,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Wait for whichever comes first: a delivered message or a keep-alive tick.
    ///
    /// SSE is a text protocol, so a payload that is not valid UTF-8 is
    /// skipped with a warning rather than altered on the wire.
    ///
    /// Returns `None` when the delivery channel is closed for good.
    pub async fn next_frame(&mut self) -> Option<String> {
        loop {
            let delivered: Option<Option<Message>> = tokio::select! {
                message = self.subscription.recv() => Some(message),
                _ = next_tick(&mut self.keep_alive) => None,
            };

            let message = match delivered {
                Some(Some(message)) => message,
                Some(None) => return None,
                None => return Some(KEEP_ALIVE_FRAME.to_string()),
            };

            match std::str::from_utf8(message.as_bytes()) {
                Ok(text) => {
                    debug!("SENT Message to: {}", self.username);
                    return Some(format_sse(MESSAGE_EVENT, text));
                }
                Err(err) => {
                    warn!("Dropped non-UTF-8 message for {}: {err}", self.username);
                }
            }
        }
    }

    /// Turn the session into a response body stream. Dropping the stream ends
    /// the session.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static {
        stream::unfold(self, |mut session| async move {
            let frame = session.next_frame().await;
            frame.map(|frame| (Ok(frame), session))
        })
    }
}

impl Drop for SseSession {
    fn drop(&mut self) {
        info!("CLOSED client connection: {}", self.username);
    }
}

async fn next_tick(keep_alive: &mut Option<Interval>) {
    match keep_alive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
