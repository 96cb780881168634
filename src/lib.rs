//! # PopCast
//!
//! `popcast` is a minimalist, in-memory message fan-out server built with Rust.
//! Clients subscribe over a long-lived Server-Sent Events stream and receive every
//! message published by any other client, in the order it was published.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `broker`: The broadcast core: subscriber registry and the sequential broadcaster.
//! - `client`: The per-connection side of the core (subscriber endpoints and handles).
//! - `config`: Handles loading and managing server configuration.
//! - `transport`: HTTP routes, the SSE session loop and the chat event encoding.
//! - `utils`: Shared utilities such as error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
