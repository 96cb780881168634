//! The `client` module defines the per-connection side of the broadcast core.
//!
//! It provides the `Subscriber` struct, the endpoint the broadcaster delivers
//! to, and the `Subscription` handle a session holds for as long as it wants
//! to receive messages.

pub mod subscriber;
pub mod subscription;

pub use subscriber::{Subscriber, SubscriberId};
pub use subscription::Subscription;
