//! Test fixtures and event generators.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use session_core::{Event, SessionEventKind, SESSION_AGGREGATE_TYPE};

pub const OWNER: &str = "org-1";

/// Deterministic instant `secs` after a fixed epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// A stored session event at `position`, created at `at(secs)`.
pub fn stored(
    session_id: &str,
    position: u64,
    kind: SessionEventKind,
    data: serde_json::Value,
    secs: i64,
) -> Event {
    Event {
        aggregate_type: SESSION_AGGREGATE_TYPE.into(),
        aggregate_id: session_id.into(),
        resource_owner: OWNER.into(),
        kind: kind.as_str().into(),
        data,
        position,
        created_at: at(secs),
        creator: "fixture".into(),
    }
}

/// Builds one session's stream with consecutive positions.
pub struct StreamBuilder {
    session_id: String,
    events: Vec<Event>,
}

impl StreamBuilder {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.into(),
            events: Vec::new(),
        }
    }

    fn push(mut self, kind: SessionEventKind, data: serde_json::Value, secs: i64) -> Self {
        let position = self.events.len() as u64 + 1;
        self.events
            .push(stored(&self.session_id, position, kind, data, secs));
        self
    }

    pub fn added(self) -> Self {
        self.push(SessionEventKind::Added, json!({}), 0)
    }

    pub fn user_checked(self, user_id: &str, secs: i64) -> Self {
        self.push(
            SessionEventKind::UserChecked,
            json!({ "user_id": user_id, "user_resource_owner": OWNER }),
            secs,
        )
    }

    pub fn password_checked(self, secs: i64) -> Self {
        self.push(SessionEventKind::PasswordChecked, json!({}), secs)
    }

    pub fn totp_checked(self, secs: i64) -> Self {
        self.push(SessionEventKind::TotpChecked, json!({}), secs)
    }

    pub fn intent_checked(self, secs: i64) -> Self {
        self.push(SessionEventKind::IntentChecked, json!({}), secs)
    }

    pub fn webauthn_challenged(self, nonce: &str, secs: i64) -> Self {
        self.push(
            SessionEventKind::WebAuthnChallenged,
            json!({
                "challenge": nonce,
                "allowed_credential_ids": [],
                "user_verification": "preferred",
                "rp_id": "login.example.com"
            }),
            secs,
        )
    }

    pub fn webauthn_checked(self, user_verified: bool, secs: i64) -> Self {
        self.push(
            SessionEventKind::WebAuthnChecked,
            json!({ "user_verified": user_verified }),
            secs,
        )
    }

    pub fn terminated(self, secs: i64) -> Self {
        self.push(SessionEventKind::Terminated, json!({}), secs)
    }

    /// An event of a kind sessions do not know (yet).
    pub fn foreign(mut self, kind: &str, secs: i64) -> Self {
        let position = self.events.len() as u64 + 1;
        let mut event = stored(&self.session_id, position, SessionEventKind::Added, json!({}), secs);
        event.kind = kind.into();
        self.events.push(event);
        self
    }

    pub fn build(self) -> Vec<Event> {
        self.events
    }
}
