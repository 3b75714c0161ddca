//! Credential verification seam.
//!
//! Password hashing, TOTP code checks, identity provider intents and WebAuthN
//! assertion validation live behind this trait; the command layer only
//! records their outcome.

use async_trait::async_trait;
use session_core::{Result, WebAuthnChallenge};

/// Outcome of a WebAuthN assertion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebAuthnOutcome {
    pub verified: bool,
    /// Whether the authenticator verified the user (PIN, biometrics)
    pub user_verified: bool,
}

/// Black-box credential checks.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool>;

    async fn verify_totp(&self, user_id: &str, code: &str) -> Result<bool>;

    /// Checks a succeeded identity provider intent belongs to `user_id`.
    async fn verify_intent(&self, user_id: &str, intent_id: &str, token: &str) -> Result<bool>;

    async fn verify_webauthn(
        &self,
        user_id: &str,
        challenge: &WebAuthnChallenge,
        assertion: &[u8],
    ) -> Result<WebAuthnOutcome>;
}
