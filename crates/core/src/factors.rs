//! Authentication factor kinds reported by a session.

use serde::{Deserialize, Serialize};

/// A factor the session has successfully checked.
///
/// One closed set, reviewed together with the session event kinds. One-time
/// codes over SMS or email will join here once sessions can record them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Password,
    /// User-verified WebAuthN; a complete login factor on its own
    Passwordless,
    /// WebAuthN without user verification; only ever a second factor
    SecurityKey,
    /// External identity provider intent
    Idp,
    Totp,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Passwordless => "passwordless",
            Self::SecurityKey => "security_key",
            Self::Idp => "idp",
            Self::Totp => "totp",
        }
    }

    /// Whether the factor may stand alone as a first factor.
    pub fn is_first_factor(&self) -> bool {
        !matches!(self, Self::SecurityKey | Self::Totp)
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
