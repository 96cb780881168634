//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `popcast` application.
//!
//! It centralizes the error types and the logging setup so every layer
//! reports failures and diagnostics the same way.

pub mod error;
pub mod logging;

pub use error::{ApiError, BrokerError, ServerError};
