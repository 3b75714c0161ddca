//! Load-decide-append cycle for session commands.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use eventstore::{load, AppendCondition, EventStore};
use session_core::{
    AddedData, CheckErrorCode, Error, LifetimeSetData, MetadataSetData, Reducer, Result,
    SessionErrorCode, SessionEvent, SessionState, SessionWriteModel, TokenSetData,
    UserCheckedData, WebAuthnChallengedData, WebAuthnCheckedData,
};
use telemetry::metrics;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::SessionCommand;
use crate::config::CommandConfig;
use crate::verifier::CredentialVerifier;
use crate::view::SessionView;

/// Result of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Session state including the events this command appended
    pub model: SessionWriteModel,
    /// Number of load-decide-append cycles it took
    pub attempts: u32,
    /// Whether anything was appended
    pub changed: bool,
}

impl CommandOutcome {
    pub fn view(&self) -> SessionView {
        SessionView::from(&self.model)
    }
}

/// Executes session commands against an event store.
///
/// Every attempt starts from a fresh load; a write model never outlives the
/// attempt that built it.
pub struct SessionCommands<S, V> {
    store: Arc<S>,
    verifier: Arc<V>,
    config: CommandConfig,
}

impl<S, V> SessionCommands<S, V>
where
    S: EventStore,
    V: CredentialVerifier,
{
    pub fn new(store: Arc<S>, verifier: Arc<V>, config: CommandConfig) -> Self {
        Self {
            store,
            verifier,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rebuilds the session from the log.
    pub async fn load(&self, session_id: &str, resource_owner: Option<&str>) -> Result<SessionWriteModel> {
        let mut model = SessionWriteModel::new(session_id, resource_owner.map(str::to_string));
        load(self.store.as_ref(), &mut model).await?;
        Ok(model)
    }

    pub async fn view(&self, session_id: &str, resource_owner: Option<&str>) -> Result<SessionView> {
        let model = self.load(session_id, resource_owner).await?;
        Ok(SessionView::from(&model))
    }

    /// Creates a session with a generated id.
    pub async fn create_session(
        &self,
        resource_owner: &str,
        command: SessionCommand,
    ) -> Result<CommandOutcome> {
        if !matches!(command, SessionCommand::Create { .. }) {
            return Err(Error::validation(format!(
                "{} cannot create a session",
                command.name()
            )));
        }
        let session_id = Uuid::new_v4().to_string();
        self.execute(&session_id, Some(resource_owner), command).await
    }

    /// Runs `command`, retrying the whole cycle on append conflicts.
    pub async fn execute(
        &self,
        session_id: &str,
        resource_owner: Option<&str>,
        command: SessionCommand,
    ) -> Result<CommandOutcome> {
        let start = Instant::now();
        metrics().commands_in_flight.inc();

        let result = self.run(session_id, resource_owner, &command).await;

        metrics().commands_in_flight.dec();
        metrics()
            .command_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match &result {
            Ok(outcome) => {
                metrics().commands_executed.inc();
                info!(
                    session_id,
                    command = command.name(),
                    attempts = outcome.attempts,
                    position = outcome.model.processed_position(),
                    "session command executed"
                );
            }
            Err(e) => {
                metrics().commands_failed.inc();
                warn!(session_id, command = command.name(), error = %e, "session command failed");
            }
        }
        result
    }

    async fn run(
        &self,
        session_id: &str,
        resource_owner: Option<&str>,
        command: &SessionCommand,
    ) -> Result<CommandOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut model = self.load(session_id, resource_owner).await?;
            let events = self.decide(&model, command).await?;

            if events.is_empty() {
                debug!(session_id, command = command.name(), "nothing to append");
                return Ok(CommandOutcome {
                    model,
                    attempts: attempt,
                    changed: false,
                });
            }

            let mut pending = Vec::with_capacity(events.len());
            for event in &events {
                event.validate()?;
                pending.push(event.to_pending()?);
            }

            let condition = AppendCondition::of(&model);
            match self.store.push(model.identity(), &condition, pending).await
            {
                Ok(appended) => {
                    model.load(appended)?;
                    return Ok(CommandOutcome {
                        model,
                        attempts: attempt,
                        changed: true,
                    });
                }
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    metrics().command_retries.inc();
                    warn!(
                        session_id,
                        command = command.name(),
                        attempt,
                        error = %e,
                        "stale session, retrying"
                    );
                    tokio::time::sleep(self.config.backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Decides which events `command` produces against `model`.
    ///
    /// Must stay safe to re-run: a retry evaluates it again on a fresh load.
    async fn decide(
        &self,
        model: &SessionWriteModel,
        command: &SessionCommand,
    ) -> Result<Vec<SessionEvent>> {
        match command {
            SessionCommand::Create { user_agent } => {
                // The owner filter hides streams of other owners from the load.
                if model.state != SessionState::Uninitialized
                    || self.store.latest_position(model.identity()).await? > 0
                {
                    return Err(Error::session(
                        SessionErrorCode::AlreadyExists,
                        format!("session {} already exists", model.session_id()),
                    ));
                }
                Ok(vec![SessionEvent::Added(AddedData {
                    user_agent: user_agent.clone(),
                })])
            }
            SessionCommand::Terminate { token_id } => {
                match model.state {
                    SessionState::Uninitialized => return Err(not_found(model)),
                    SessionState::Terminated => return Ok(Vec::new()),
                    SessionState::Active => {}
                }
                if let Some(token_id) = token_id {
                    if model.token_id.as_deref() != Some(token_id.as_str()) {
                        return Err(Error::session(
                            SessionErrorCode::PermissionDenied,
                            "token does not match session",
                        ));
                    }
                }
                Ok(vec![SessionEvent::Terminated])
            }
            SessionCommand::CheckUser {
                user_id,
                user_resource_owner,
            } => {
                ensure_active(model)?;
                if let Some(existing) = &model.user_id {
                    if existing != user_id {
                        return Err(Error::session(
                            SessionErrorCode::PermissionDenied,
                            "session already identified a different user",
                        ));
                    }
                }
                Ok(vec![SessionEvent::UserChecked(UserCheckedData {
                    user_id: user_id.clone(),
                    user_resource_owner: user_resource_owner.clone(),
                })])
            }
            SessionCommand::CheckPassword { password } => {
                ensure_active(model)?;
                let user_id = require_user(model)?;
                if !self.verifier.verify_password(user_id, password).await? {
                    return Err(invalid_credentials("password"));
                }
                Ok(vec![SessionEvent::PasswordChecked])
            }
            SessionCommand::CheckIntent { intent_id, token } => {
                ensure_active(model)?;
                let user_id = require_user(model)?;
                if !self.verifier.verify_intent(user_id, intent_id, token).await? {
                    return Err(invalid_credentials("intent"));
                }
                Ok(vec![SessionEvent::IntentChecked])
            }
            SessionCommand::CheckTotp { code } => {
                ensure_active(model)?;
                let user_id = require_user(model)?;
                if !self.verifier.verify_totp(user_id, code).await? {
                    return Err(invalid_credentials("totp"));
                }
                Ok(vec![SessionEvent::TotpChecked])
            }
            SessionCommand::ChallengeWebAuthn {
                allowed_credential_ids,
                user_verification,
                rp_id,
            } => {
                ensure_active(model)?;
                require_user(model)?;
                Ok(vec![SessionEvent::WebAuthnChallenged(WebAuthnChallengedData {
                    challenge: Uuid::new_v4().simple().to_string(),
                    allowed_credential_ids: allowed_credential_ids.clone(),
                    user_verification: *user_verification,
                    rp_id: rp_id.clone(),
                })])
            }
            SessionCommand::CheckWebAuthn { assertion } => {
                ensure_active(model)?;
                let user_id = require_user(model)?;
                let challenge = model.challenge.as_ref().ok_or_else(|| {
                    Error::check(CheckErrorCode::ChallengeMissing, "no webauthn challenge outstanding")
                })?;

                let outcome = self
                    .verifier
                    .verify_webauthn(user_id, challenge, assertion)
                    .await?;
                if !outcome.verified {
                    return Err(invalid_credentials("webauthn assertion"));
                }
                if challenge.requires_user_verification() && !outcome.user_verified {
                    return Err(Error::check(
                        CheckErrorCode::InvalidCredentials,
                        "user verification required",
                    ));
                }
                Ok(vec![SessionEvent::WebAuthnChecked(WebAuthnCheckedData {
                    user_verified: outcome.user_verified,
                })])
            }
            SessionCommand::SetToken => {
                ensure_active(model)?;
                Ok(vec![SessionEvent::TokenSet(TokenSetData {
                    token_id: Uuid::new_v4().to_string(),
                })])
            }
            SessionCommand::SetMetadata { entries } => {
                ensure_active(model)?;
                let changed: std::collections::BTreeMap<_, _> = entries
                    .iter()
                    .filter(|(key, value)| {
                        model.metadata.get(*key).map_or(!value.is_empty(), |v| v != *value)
                    })
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                if changed.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![SessionEvent::MetadataSet(MetadataSetData { metadata: changed })])
            }
            SessionCommand::SetLifetime { lifetime_secs } => {
                ensure_active(model)?;
                Ok(vec![SessionEvent::LifetimeSet(LifetimeSetData {
                    lifetime_secs: *lifetime_secs,
                })])
            }
        }
    }
}

fn not_found(model: &SessionWriteModel) -> Error {
    Error::session(
        SessionErrorCode::NotFound,
        format!("session {} not found", model.session_id()),
    )
}

fn ensure_active(model: &SessionWriteModel) -> Result<()> {
    match model.state {
        SessionState::Uninitialized => Err(not_found(model)),
        SessionState::Terminated => Err(Error::session(
            SessionErrorCode::Terminated,
            "session ended",
        )),
        SessionState::Active if model.is_expired(Utc::now()) => Err(Error::session(
            SessionErrorCode::Terminated,
            "session expired",
        )),
        SessionState::Active => Ok(()),
    }
}

fn require_user(model: &SessionWriteModel) -> Result<&str> {
    model.user_id.as_deref().ok_or_else(|| {
        Error::session(SessionErrorCode::UserMissing, "no user checked on session")
    })
}

fn invalid_credentials(factor: &str) -> Error {
    Error::check(
        CheckErrorCode::InvalidCredentials,
        format!("{factor} check failed"),
    )
}
