//! Connector SDK - operational resilience helpers.

pub mod retry;

pub use retry::{retry_blocking, RetryPolicy};
