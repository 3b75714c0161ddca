//! Command layer for login sessions.
//!
//! Every command runs a full load-decide-append cycle against the event log
//! and retries the whole cycle when the conditioned append conflicts.

pub mod command;
pub mod config;
pub mod session;
pub mod verifier;
pub mod view;

pub use command::*;
pub use config::*;
pub use session::*;
pub use verifier::*;
pub use view::*;
