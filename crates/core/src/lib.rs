//! Core types, event decoding, and the session write model.

pub mod aggregate;
pub mod challenge;
pub mod error;
pub mod event;
pub mod events;
pub mod factors;
pub mod limits;
pub mod query;
pub mod session;
pub mod write_model;

pub use aggregate::*;
pub use challenge::*;
pub use error::{CheckErrorCode, Error, Result, SessionErrorCode, StoreErrorCode};
pub use event::*;
pub use events::*;
pub use factors::*;
pub use query::*;
pub use session::*;
pub use write_model::*;
