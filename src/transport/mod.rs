//! The `transport` module is responsible for handling network communication
//! with clients over HTTP.
//!
//! It defines the request and event shapes exchanged with clients, the SSE
//! framing and per-connection session loop, and the axum router that forwards
//! client requests to the broker.

pub mod http;
pub mod message;
pub mod sse;

pub use http::{AppState, router, serve};
pub use message::{ChatEvent, EventType, SendRequest, SubscribeQuery};
pub use sse::{SseSession, format_sse};
