//! Event log contract and an in-memory implementation.

pub mod memory;
pub mod store;

pub use memory::*;
pub use store::*;
