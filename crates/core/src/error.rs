//! Unified error types for the session engine.
//!
//! Error codes:
//! - STORE_001-002: Event log errors
//! - EVENT_001: Malformed stored events
//! - SESSION_001-005: Session lifecycle errors
//! - CHECK_001-002: Factor check errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Event log error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: The event log could not be read
    QueryFailed,
    /// STORE_002: The aggregate moved on since it was loaded
    Conflict,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueryFailed => "STORE_001",
            Self::Conflict => "STORE_002",
        }
    }
}

/// Session lifecycle error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    /// SESSION_001: No session-added event exists for the aggregate
    NotFound,
    /// SESSION_002: The session was already created
    AlreadyExists,
    /// SESSION_003: The session was terminated
    Terminated,
    /// SESSION_004: No user has been identified on the session yet
    UserMissing,
    /// SESSION_005: Caller is not allowed to touch this session
    PermissionDenied,
}

impl SessionErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "SESSION_001",
            Self::AlreadyExists => "SESSION_002",
            Self::Terminated => "SESSION_003",
            Self::UserMissing => "SESSION_004",
            Self::PermissionDenied => "SESSION_005",
        }
    }
}

/// Factor check error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckErrorCode {
    /// CHECK_001: The verifier rejected the presented credential
    InvalidCredentials,
    /// CHECK_002: A WebAuthN assertion arrived without an outstanding challenge
    ChallengeMissing,
}

impl CheckErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "CHECK_001",
            Self::ChallengeMissing => "CHECK_002",
        }
    }
}

/// Unified error type for the session engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading the event log failed; surfaced unchanged.
    #[error("[STORE_001] event query failed: {0}")]
    Query(String),

    /// Conditioned append rejected because newer events exist.
    #[error("[STORE_002] expected position {expected}, aggregate is at {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// A stored event of a known kind could not be decoded.
    #[error("[EVENT_001] malformed {kind} event at position {position}: {reason}")]
    MalformedEvent {
        kind: String,
        position: u64,
        reason: String,
    },

    /// Session lifecycle error with code.
    #[error("[{code}] {message}")]
    Session {
        code: &'static str,
        message: String,
    },

    /// Factor check error with code.
    #[error("[{code}] {message}")]
    Check {
        code: &'static str,
        message: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn conflict(expected: u64, actual: u64) -> Self {
        Self::Conflict { expected, actual }
    }

    pub fn malformed(kind: impl Into<String>, position: u64, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            kind: kind.into(),
            position,
            reason: reason.into(),
        }
    }

    /// Create a session lifecycle error.
    pub fn session(code: SessionErrorCode, msg: impl Into<String>) -> Self {
        Self::Session {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a factor check error.
    pub fn check(code: CheckErrorCode, msg: impl Into<String>) -> Self {
        Self::Check {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether re-running the whole load-decide-append cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Query(_) => Some(StoreErrorCode::QueryFailed.code()),
            Self::Conflict { .. } => Some(StoreErrorCode::Conflict.code()),
            Self::MalformedEvent { .. } => Some("EVENT_001"),
            Self::Session { code, .. } => Some(code),
            Self::Check { code, .. } => Some(code),
            _ => None,
        }
    }
}
