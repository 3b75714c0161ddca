//! Shared helpers for the session engine integration tests.

pub mod fixtures;
pub mod setup;
