//! The `broker` module is the broadcast core.
//!
//! - `registry`: the set of currently connected subscribers.
//! - `engine`: the `Broker` handle and the sequential broadcaster task.
//! - `message`: the opaque payload moved between them.

pub mod engine;
pub mod message;
pub mod registry;

pub use engine::{Broker, BrokerState};
pub use message::Message;
pub use registry::SubscriberRegistry;

#[cfg(test)]
mod tests;
