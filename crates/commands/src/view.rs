//! Read-only session facts handed to the login UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use session_core::{AuthMethod, SessionState, SessionWriteModel};

/// The only session facts rendering may read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub state: SessionState,
    pub user_id: Option<String>,
    pub authentication_instant: Option<DateTime<Utc>>,
    pub factors: Vec<AuthMethod>,
    pub has_challenge: bool,
    pub expiration: Option<DateTime<Utc>>,
    /// Position the view was built at
    pub position: u64,
}

impl From<&SessionWriteModel> for SessionView {
    fn from(model: &SessionWriteModel) -> Self {
        Self {
            session_id: model.session_id().to_string(),
            state: model.state,
            user_id: model.user_id.clone(),
            authentication_instant: model.authentication_instant(),
            factors: model.authenticated_factors(),
            has_challenge: model.has_challenge(),
            expiration: model.expiration,
            position: model.processed_position(),
        }
    }
}

impl SessionView {
    /// Whether the session can still be used at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.state == SessionState::Active && self.expiration.map_or(true, |e| e > now)
    }
}
