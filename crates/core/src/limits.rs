//! Size limits for session event payloads.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated there. Keep both in sync when modifying.

/// Maximum length of ids carried in payloads (user, token, intent).
pub const MAX_ID_LEN: usize = 200;

/// Maximum length of a WebAuthN challenge nonce.
pub const MAX_CHALLENGE_LEN: usize = 512;

/// Maximum length of a relying party id (a DNS name).
pub const MAX_RP_ID_LEN: usize = 253;

/// Maximum number of credentials a challenge may allow.
pub const MAX_ALLOWED_CREDENTIALS: usize = 100;

/// Maximum length of a metadata key.
pub const MAX_METADATA_KEY_LEN: usize = 200;

/// Maximum size of a single metadata value in bytes (64KB).
pub const MAX_METADATA_VALUE_BYTES: usize = 64 * 1024;

/// Maximum length of a user agent fingerprint or description.
pub const MAX_USER_AGENT_FIELD_LEN: usize = 512;

/// IP address max length (IPv6 = 45 chars).
pub const MAX_IP_LEN: usize = 45;

/// Maximum session lifetime in seconds (ten years).
pub const MAX_LIFETIME_SECS: i64 = 315_360_000;
