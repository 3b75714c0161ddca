//! Session write model: replays a session's events into its current
//! authentication state.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::debug;

use crate::aggregate::{AggregateIdentity, SESSION_AGGREGATE_TYPE};
use crate::challenge::WebAuthnChallenge;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::events::{SessionEvent, SessionEventKind, UserAgent};
use crate::factors::AuthMethod;
use crate::query::SearchQuery;
use crate::write_model::{Reducer, WriteModel};

/// Lifecycle of a session. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Active,
    Terminated,
}

/// Projection of one session aggregate.
///
/// The reducer keeps folding after a terminate event; rejecting commands
/// against ended sessions is the command layer's job.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionWriteModel {
    base: WriteModel,

    pub state: SessionState,
    pub user_agent: Option<UserAgent>,
    pub user_id: Option<String>,
    pub user_resource_owner: Option<String>,
    pub user_checked_at: Option<DateTime<Utc>>,
    pub password_checked_at: Option<DateTime<Utc>>,
    pub intent_checked_at: Option<DateTime<Utc>>,
    pub webauthn_checked_at: Option<DateTime<Utc>>,
    /// Meaningful only once `webauthn_checked_at` is set
    pub webauthn_user_verified: bool,
    pub totp_checked_at: Option<DateTime<Utc>>,
    pub token_id: Option<String>,
    pub metadata: BTreeMap<String, Vec<u8>>,
    pub expiration: Option<DateTime<Utc>>,
    pub challenge: Option<WebAuthnChallenge>,
}

impl SessionWriteModel {
    /// Creates an empty model for the session `session_id`.
    pub fn new(session_id: impl Into<String>, resource_owner: Option<String>) -> Self {
        Self {
            base: WriteModel::new(AggregateIdentity::session(session_id, resource_owner)),
            state: SessionState::Uninitialized,
            user_agent: None,
            user_id: None,
            user_resource_owner: None,
            user_checked_at: None,
            password_checked_at: None,
            intent_checked_at: None,
            webauthn_checked_at: None,
            webauthn_user_verified: false,
            totp_checked_at: None,
            token_id: None,
            metadata: BTreeMap::new(),
            expiration: None,
            challenge: None,
        }
    }

    pub fn session_id(&self) -> &str {
        self.base.aggregate_id()
    }

    pub fn identity(&self) -> &AggregateIdentity {
        &self.base.identity
    }

    /// Position to condition the next append on.
    pub fn processed_position(&self) -> u64 {
        self.base.processed_position
    }

    pub fn change_date(&self) -> Option<DateTime<Utc>> {
        self.base.change_date
    }

    /// Latest of all factor checks; the session is as fresh as its most
    /// recent successful check. `None` if no factor was checked.
    pub fn authentication_instant(&self) -> Option<DateTime<Utc>> {
        [
            self.password_checked_at,
            self.webauthn_checked_at,
            self.totp_checked_at,
            self.intent_checked_at,
        ]
        .into_iter()
        .flatten()
        .max()
    }

    /// Factors with a successful check, in the order password, webauthn,
    /// intent, totp.
    pub fn authenticated_factors(&self) -> Vec<AuthMethod> {
        let mut factors = Vec::with_capacity(4);
        if self.password_checked_at.is_some() {
            factors.push(AuthMethod::Password);
        }
        if self.webauthn_checked_at.is_some() {
            if self.webauthn_user_verified {
                factors.push(AuthMethod::Passwordless);
            } else {
                factors.push(AuthMethod::SecurityKey);
            }
        }
        if self.intent_checked_at.is_some() {
            factors.push(AuthMethod::Idp);
        }
        if self.totp_checked_at.is_some() {
            factors.push(AuthMethod::Totp);
        }
        factors
    }

    pub fn has_challenge(&self) -> bool {
        self.challenge.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|expiration| expiration <= now)
    }

    /// The first identified user sticks; later checks only refresh the time.
    fn reduce_user_checked(&mut self, user_id: String, user_resource_owner: String, at: DateTime<Utc>) {
        if self.user_id.is_none() {
            self.user_id = Some(user_id);
            self.user_resource_owner = Some(user_resource_owner).filter(|o| !o.is_empty());
        }
        self.user_checked_at = Some(at);
    }

    fn reduce_metadata_set(&mut self, metadata: BTreeMap<String, Vec<u8>>) {
        for (key, value) in metadata {
            if value.is_empty() {
                self.metadata.remove(&key);
            } else {
                self.metadata.insert(key, value);
            }
        }
    }
}

impl Reducer for SessionWriteModel {
    fn base(&self) -> &WriteModel {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriteModel {
        &mut self.base
    }

    fn apply(&mut self, event: &Event) -> Result<()> {
        let Some(decoded) = SessionEvent::decode(event)? else {
            debug!(
                kind = %event.kind,
                position = event.position,
                session_id = %self.session_id(),
                "skipping unknown session event kind"
            );
            metrics().unknown_events_skipped.inc();
            return Ok(());
        };

        let at = event.created_at;
        match decoded {
            SessionEvent::Added(data) => {
                self.state = SessionState::Active;
                self.user_agent = data.user_agent;
            }
            SessionEvent::UserChecked(data) => {
                self.reduce_user_checked(data.user_id, data.user_resource_owner, at);
            }
            SessionEvent::PasswordChecked => self.password_checked_at = Some(at),
            SessionEvent::IntentChecked => self.intent_checked_at = Some(at),
            SessionEvent::WebAuthnChallenged(data) => {
                self.challenge = Some(WebAuthnChallenge {
                    challenge: data.challenge,
                    allowed_credential_ids: data.allowed_credential_ids.into_iter().collect(),
                    user_verification: data.user_verification,
                    rp_id: data.rp_id,
                    challenged_at: at,
                });
            }
            SessionEvent::WebAuthnChecked(data) => {
                self.challenge = None;
                self.webauthn_checked_at = Some(at);
                self.webauthn_user_verified = data.user_verified;
            }
            SessionEvent::TotpChecked => self.totp_checked_at = Some(at),
            SessionEvent::TokenSet(data) => self.token_id = Some(data.token_id),
            SessionEvent::MetadataSet(data) => self.reduce_metadata_set(data.metadata),
            SessionEvent::LifetimeSet(data) => {
                let expiration = Duration::try_seconds(data.lifetime_secs)
                    .and_then(|lifetime| at.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        Error::malformed(&event.kind, event.position, "lifetime out of range")
                    })?;
                self.expiration = Some(expiration);
            }
            SessionEvent::Terminated => self.state = SessionState::Terminated,
        }
        Ok(())
    }

    fn query(&self) -> SearchQuery {
        SearchQuery::builder()
            .aggregate_types([SESSION_AGGREGATE_TYPE])
            .aggregate_ids([self.session_id()])
            .event_kinds(SessionEventKind::ALL.iter().map(|k| k.as_str()))
            .resource_owner(self.base.resource_owner())
            .build()
    }
}
