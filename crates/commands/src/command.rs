//! Commands accepted by a session.

use std::collections::BTreeMap;

use session_core::{UserAgent, UserVerificationRequirement};

/// A request to change one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Create {
        user_agent: Option<UserAgent>,
    },
    CheckUser {
        user_id: String,
        user_resource_owner: String,
    },
    CheckPassword {
        password: String,
    },
    CheckIntent {
        intent_id: String,
        token: String,
    },
    ChallengeWebAuthn {
        allowed_credential_ids: Vec<Vec<u8>>,
        user_verification: UserVerificationRequirement,
        rp_id: String,
    },
    CheckWebAuthn {
        assertion: Vec<u8>,
    },
    CheckTotp {
        code: String,
    },
    SetToken,
    SetMetadata {
        /// Empty values remove the key
        entries: BTreeMap<String, Vec<u8>>,
    },
    SetLifetime {
        lifetime_secs: i64,
    },
    Terminate {
        /// Current token id of the session, if the caller holds one
        token_id: Option<String>,
    },
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::CheckUser { .. } => "check_user",
            Self::CheckPassword { .. } => "check_password",
            Self::CheckIntent { .. } => "check_intent",
            Self::ChallengeWebAuthn { .. } => "challenge_webauthn",
            Self::CheckWebAuthn { .. } => "check_webauthn",
            Self::CheckTotp { .. } => "check_totp",
            Self::SetToken => "set_token",
            Self::SetMetadata { .. } => "set_metadata",
            Self::SetLifetime { .. } => "set_lifetime",
            Self::Terminate { .. } => "terminate",
        }
    }
}
