//! Session event definitions and their stored encoding.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::challenge::UserVerificationRequirement;
use crate::error::{Error, Result};
use crate::event::{Event, PendingEvent};
use crate::limits::{MAX_METADATA_KEY_LEN, MAX_METADATA_VALUE_BYTES};

/// Closed set of event kinds a session folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    Added,
    UserChecked,
    PasswordChecked,
    IntentChecked,
    WebAuthnChallenged,
    WebAuthnChecked,
    TotpChecked,
    TokenSet,
    MetadataSet,
    LifetimeSet,
    Terminated,
}

impl SessionEventKind {
    pub const ALL: [Self; 11] = [
        Self::Added,
        Self::UserChecked,
        Self::PasswordChecked,
        Self::IntentChecked,
        Self::WebAuthnChallenged,
        Self::WebAuthnChecked,
        Self::TotpChecked,
        Self::TokenSet,
        Self::MetadataSet,
        Self::LifetimeSet,
        Self::Terminated,
    ];

    /// Returns the stored kind string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "session.added",
            Self::UserChecked => "session.user.checked",
            Self::PasswordChecked => "session.password.checked",
            Self::IntentChecked => "session.intent.checked",
            Self::WebAuthnChallenged => "session.webAuthN.challenged",
            Self::WebAuthnChecked => "session.webAuthN.checked",
            Self::TotpChecked => "session.totp.checked",
            Self::TokenSet => "session.token.set",
            Self::MetadataSet => "session.metadata.set",
            Self::LifetimeSet => "session.lifetime.set",
            Self::Terminated => "session.terminated",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl std::fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client that opened the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserAgent {
    #[validate(length(max = 512))]
    pub fingerprint_id: Option<String>,
    #[validate(length(max = 45))]
    pub ip: Option<String>,
    #[validate(length(max = 512))]
    pub description: Option<String>,
    #[serde(default)]
    pub header: BTreeMap<String, Vec<String>>,
}

/// Session added event data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AddedData {
    #[validate(nested)]
    pub user_agent: Option<UserAgent>,
}

/// User checked event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserCheckedData {
    #[validate(length(min = 1, max = 200))]
    pub user_id: String,
    /// Organisation owning the user
    #[serde(default)]
    #[validate(length(max = 200))]
    pub user_resource_owner: String,
}

/// WebAuthN challenged event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WebAuthnChallengedData {
    #[validate(length(min = 1, max = 512))]
    pub challenge: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub allowed_credential_ids: Vec<Vec<u8>>,
    #[serde(default)]
    pub user_verification: UserVerificationRequirement,
    #[validate(length(min = 1, max = 253))]
    pub rp_id: String,
}

/// WebAuthN checked event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WebAuthnCheckedData {
    pub user_verified: bool,
}

/// Token set event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TokenSetData {
    #[validate(length(min = 1, max = 200))]
    pub token_id: String,
}

fn validate_metadata(metadata: &BTreeMap<String, Vec<u8>>) -> std::result::Result<(), ValidationError> {
    for (key, value) in metadata {
        if key.is_empty() || key.len() > MAX_METADATA_KEY_LEN {
            let mut err = ValidationError::new("metadata_key");
            err.message = Some(format!("metadata key must be 1-{MAX_METADATA_KEY_LEN} chars").into());
            return Err(err);
        }
        if value.len() > MAX_METADATA_VALUE_BYTES {
            let mut err = ValidationError::new("metadata_value_too_large");
            err.message = Some(
                format!(
                    "metadata {key} {}KB exceeds {}KB limit",
                    value.len() / 1024,
                    MAX_METADATA_VALUE_BYTES / 1024
                )
                .into(),
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Metadata set event data. An empty value removes the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MetadataSetData {
    #[validate(custom(function = "validate_metadata"))]
    pub metadata: BTreeMap<String, Vec<u8>>,
}

/// Lifetime set event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LifetimeSetData {
    /// Seconds from the event time until the session expires
    #[validate(range(min = 1, max = 315_360_000))]
    pub lifetime_secs: i64,
}

/// Typed session event.
///
/// Kinds without payload are unit variants; their stored data is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Added(AddedData),
    UserChecked(UserCheckedData),
    PasswordChecked,
    IntentChecked,
    WebAuthnChallenged(WebAuthnChallengedData),
    WebAuthnChecked(WebAuthnCheckedData),
    TotpChecked,
    TokenSet(TokenSetData),
    MetadataSet(MetadataSetData),
    LifetimeSet(LifetimeSetData),
    Terminated,
}

impl SessionEvent {
    pub fn kind(&self) -> SessionEventKind {
        match self {
            Self::Added(_) => SessionEventKind::Added,
            Self::UserChecked(_) => SessionEventKind::UserChecked,
            Self::PasswordChecked => SessionEventKind::PasswordChecked,
            Self::IntentChecked => SessionEventKind::IntentChecked,
            Self::WebAuthnChallenged(_) => SessionEventKind::WebAuthnChallenged,
            Self::WebAuthnChecked(_) => SessionEventKind::WebAuthnChecked,
            Self::TotpChecked => SessionEventKind::TotpChecked,
            Self::TokenSet(_) => SessionEventKind::TokenSet,
            Self::MetadataSet(_) => SessionEventKind::MetadataSet,
            Self::LifetimeSet(_) => SessionEventKind::LifetimeSet,
            Self::Terminated => SessionEventKind::Terminated,
        }
    }

    /// Decodes a stored event.
    ///
    /// Returns `Ok(None)` for kinds outside [`SessionEventKind::ALL`] and
    /// [`Error::MalformedEvent`] when a known kind carries a payload that
    /// does not decode or validate.
    pub fn decode(event: &Event) -> Result<Option<Self>> {
        let Some(kind) = SessionEventKind::parse(&event.kind) else {
            return Ok(None);
        };

        let decoded = match kind {
            SessionEventKind::Added => Self::Added(payload(event)?),
            SessionEventKind::UserChecked => Self::UserChecked(payload(event)?),
            SessionEventKind::PasswordChecked => Self::PasswordChecked,
            SessionEventKind::IntentChecked => Self::IntentChecked,
            SessionEventKind::WebAuthnChallenged => Self::WebAuthnChallenged(payload(event)?),
            SessionEventKind::WebAuthnChecked => Self::WebAuthnChecked(payload(event)?),
            SessionEventKind::TotpChecked => Self::TotpChecked,
            SessionEventKind::TokenSet => Self::TokenSet(payload(event)?),
            SessionEventKind::MetadataSet => Self::MetadataSet(payload(event)?),
            SessionEventKind::LifetimeSet => Self::LifetimeSet(payload(event)?),
            SessionEventKind::Terminated => Self::Terminated,
        };
        Ok(Some(decoded))
    }

    /// Runs the payload checks applied when the event is decoded again.
    pub fn validate(&self) -> Result<()> {
        let result = match self {
            Self::Added(data) => data.validate(),
            Self::UserChecked(data) => data.validate(),
            Self::WebAuthnChallenged(data) => data.validate(),
            Self::WebAuthnChecked(data) => data.validate(),
            Self::TokenSet(data) => data.validate(),
            Self::MetadataSet(data) => data.validate(),
            Self::LifetimeSet(data) => data.validate(),
            Self::PasswordChecked | Self::IntentChecked | Self::TotpChecked | Self::Terminated => {
                Ok(())
            }
        };
        result.map_err(|e| Error::validation(format!("{}: {}", self.kind(), e)))
    }

    /// Encodes the event for appending.
    pub fn to_pending(&self) -> Result<PendingEvent> {
        let data = match self {
            Self::Added(data) => serde_json::to_value(data)?,
            Self::UserChecked(data) => serde_json::to_value(data)?,
            Self::WebAuthnChallenged(data) => serde_json::to_value(data)?,
            Self::WebAuthnChecked(data) => serde_json::to_value(data)?,
            Self::TokenSet(data) => serde_json::to_value(data)?,
            Self::MetadataSet(data) => serde_json::to_value(data)?,
            Self::LifetimeSet(data) => serde_json::to_value(data)?,
            Self::PasswordChecked | Self::IntentChecked | Self::TotpChecked | Self::Terminated => {
                serde_json::Value::Object(Default::default())
            }
        };
        Ok(PendingEvent::new(self.kind().as_str(), data))
    }
}

fn payload<T: DeserializeOwned + Validate>(event: &Event) -> Result<T> {
    // Absent data decodes like an empty object so optional fields default.
    let data = if event.data.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        event.data.clone()
    };

    let value: T = serde_json::from_value(data)
        .map_err(|e| Error::malformed(&event.kind, event.position, e.to_string()))?;
    value
        .validate()
        .map_err(|e| Error::malformed(&event.kind, event.position, e.to_string()))?;
    Ok(value)
}
