//! Common test setup functions.

use session_commands::{CommandConfig, SessionCommand, SessionCommands};
use session_core::{Event, Result};
use std::sync::Arc;

use crate::fixtures::OWNER;
use crate::mocks::{MockEventStore, MockVerifier};

/// Command layer wired to a mock store and verifier.
pub struct TestContext {
    pub store: Arc<MockEventStore>,
    pub verifier: Arc<MockVerifier>,
    pub commands: Arc<SessionCommands<MockEventStore, MockVerifier>>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_store(MockEventStore::new(), CommandConfig::default())
    }

    /// Context over a pre-populated log.
    pub fn with_events(events: Vec<Event>) -> Self {
        Self::with_store(MockEventStore::from_events(events), CommandConfig::default())
    }

    pub fn with_config(config: CommandConfig) -> Self {
        Self::with_store(MockEventStore::new(), config)
    }

    fn with_store(store: MockEventStore, config: CommandConfig) -> Self {
        telemetry::init_tracing(telemetry::TracingConfig::new().with_filter("warn"));

        let store = Arc::new(store);
        let verifier = Arc::new(MockVerifier::new());
        let commands = Arc::new(SessionCommands::new(
            store.clone(),
            verifier.clone(),
            config,
        ));
        Self {
            store,
            verifier,
            commands,
        }
    }

    /// Creates a session and identifies user `user_id` on it.
    pub async fn identified_session(&self, user_id: &str) -> Result<String> {
        let created = self
            .commands
            .create_session(OWNER, SessionCommand::Create { user_agent: None })
            .await?;
        let session_id = created.model.session_id().to_string();
        self.commands
            .execute(
                &session_id,
                Some(OWNER),
                SessionCommand::CheckUser {
                    user_id: user_id.into(),
                    user_resource_owner: OWNER.into(),
                },
            )
            .await?;
        Ok(session_id)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
