//! API request handlers.

/// Health check.
pub mod health;
/// Research run lifecycle: start, review, inspect, discard.
pub mod research;
