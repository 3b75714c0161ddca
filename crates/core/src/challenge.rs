//! Outstanding WebAuthN challenge held by a session.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relying party requirement on user verification (PIN, biometrics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    #[default]
    Unspecified,
    Required,
    Preferred,
    Discouraged,
}

/// Parameters needed to verify the assertion answering an issued challenge.
///
/// Pure data. A new challenge replaces the previous one as a whole and a
/// check clears it; a failed verification needs a fresh challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthnChallenge {
    /// Nonce the authenticator has to sign
    pub challenge: String,
    pub allowed_credential_ids: BTreeSet<Vec<u8>>,
    pub user_verification: UserVerificationRequirement,
    /// Relying party id (domain)
    pub rp_id: String,
    pub challenged_at: DateTime<Utc>,
}

impl WebAuthnChallenge {
    /// Whether `credential_id` may answer this challenge. An empty allow list
    /// accepts any credential (discoverable login).
    pub fn allows(&self, credential_id: &[u8]) -> bool {
        self.allowed_credential_ids.is_empty() || self.allowed_credential_ids.contains(credential_id)
    }

    pub fn requires_user_verification(&self) -> bool {
        self.user_verification == UserVerificationRequirement::Required
    }
}
