//! Optimistic concurrency between writers of the same session.

use std::collections::BTreeMap;
use std::sync::Arc;

use eventstore::{AppendCondition, EventStore};
use integration_tests::fixtures::{StreamBuilder, OWNER};
use integration_tests::setup::TestContext;
use serde_json::json;
use session_commands::{CommandConfig, SessionCommand};
use session_core::{
    Error, PendingEvent, Reducer, SessionEvent, SessionEventKind, SessionWriteModel,
};

fn metadata_write(key: &str) -> PendingEvent {
    PendingEvent::new(
        SessionEventKind::MetadataSet.as_str(),
        json!({ "metadata": { key: [1] } }),
    )
    .with_creator("concurrent-writer")
}

#[tokio::test]
async fn test_second_writer_at_same_position_conflicts() {
    let ctx = TestContext::new();
    let session_id = ctx.identified_session("u1").await.unwrap();

    let first = ctx.commands.load(&session_id, Some(OWNER)).await.unwrap();
    let second = ctx.commands.load(&session_id, Some(OWNER)).await.unwrap();
    assert_eq!(first.processed_position(), second.processed_position());

    let pending = SessionEvent::PasswordChecked.to_pending().unwrap();
    ctx.store
        .push(first.identity(), &AppendCondition::of(&first), vec![pending.clone()])
        .await
        .unwrap();

    let err = ctx
        .store
        .push(second.identity(), &AppendCondition::of(&second), vec![pending])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Conflict { expected, actual } if actual == expected + 1
    ));

    let reloaded = ctx.commands.load(&session_id, Some(OWNER)).await.unwrap();
    assert_eq!(reloaded.processed_position(), first.processed_position() + 1);
}

#[tokio::test]
async fn test_command_retries_after_interleaved_write() {
    let ctx = TestContext::new();
    let session_id = ctx.identified_session("u1").await.unwrap();
    ctx.store.interleave([metadata_write("device")]);

    let outcome = ctx
        .commands
        .execute(
            &session_id,
            Some(OWNER),
            SessionCommand::CheckPassword {
                password: "correct horse".into(),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert!(outcome.model.password_checked_at.is_some());
    // The retry saw the concurrent write.
    assert!(outcome.model.metadata.contains_key("device"));
    // Both attempts ran the check against the verifier.
    assert_eq!(ctx.verifier.calls(), 2);
}

#[tokio::test]
async fn test_conflict_surfaces_without_retries() {
    let ctx = TestContext::with_config(CommandConfig {
        max_retries: 0,
        retry_backoff_ms: 0,
    });
    let session_id = ctx.identified_session("u1").await.unwrap();
    let before = ctx.commands.load(&session_id, Some(OWNER)).await.unwrap();
    ctx.store.interleave([metadata_write("device")]);

    let err = ctx
        .commands
        .execute(&session_id, Some(OWNER), SessionCommand::SetToken)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    // Only the concurrent write landed.
    let after = ctx.commands.load(&session_id, Some(OWNER)).await.unwrap();
    assert_eq!(after.processed_position(), before.processed_position() + 1);
    assert!(after.token_id.is_none());
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let ctx = TestContext::with_config(CommandConfig {
        max_retries: 2,
        retry_backoff_ms: 1,
    });
    let session_id = ctx.identified_session("u1").await.unwrap();
    let pushes_before = ctx.store.push_count();
    ctx.store
        .interleave(["a", "b", "c", "d"].into_iter().map(metadata_write));

    let err = ctx
        .commands
        .execute(&session_id, Some(OWNER), SessionCommand::SetToken)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(ctx.store.push_count() - pushes_before, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_writers_all_land() {
    let ctx = TestContext::with_config(CommandConfig {
        max_retries: 16,
        retry_backoff_ms: 1,
    });
    let session_id = ctx.identified_session("u1").await.unwrap();
    let commands = Arc::clone(&ctx.commands);

    let mut handles = Vec::new();
    for i in 0..4 {
        let commands = Arc::clone(&commands);
        let session_id = session_id.clone();
        handles.push(tokio::spawn(async move {
            let entries = BTreeMap::from([(format!("key-{i}"), vec![i as u8 + 1])]);
            commands
                .execute(&session_id, Some(OWNER), SessionCommand::SetMetadata { entries })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let model = ctx.commands.load(&session_id, Some(OWNER)).await.unwrap();
    assert_eq!(model.metadata.len(), 4);

    // Positions stay gap-free: added, user checked, four metadata writes.
    let events = ctx.store.filter(&model.query()).await.unwrap();
    let positions: Vec<u64> = events.iter().map(|e| e.position).collect();
    assert_eq!(positions, (1..=6).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_stale_model_catches_up_incrementally() {
    let ctx = TestContext::new();
    let session_id = ctx.identified_session("u1").await.unwrap();
    let mut model: SessionWriteModel = ctx.commands.load(&session_id, Some(OWNER)).await.unwrap();

    ctx.commands
        .execute(
            &session_id,
            Some(OWNER),
            SessionCommand::CheckTotp {
                code: "246810".into(),
            },
        )
        .await
        .unwrap();

    // Re-delivering the full stream only folds the new event.
    let events = ctx.store.filter(&model.query()).await.unwrap();
    model.load(events).unwrap();
    assert!(model.totp_checked_at.is_some());
    assert_eq!(model, ctx.commands.load(&session_id, Some(OWNER)).await.unwrap());
}

#[tokio::test]
async fn test_trailing_unknown_kind_does_not_block_writes() {
    let events = StreamBuilder::new("s1")
        .added()
        .user_checked("u1", 1)
        .foreign("session.otp.sms.checked", 2)
        .build();
    let ctx = TestContext::with_events(events);

    let outcome = ctx
        .commands
        .execute("s1", Some(OWNER), SessionCommand::SetToken)
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 1);
    assert!(outcome.model.token_id.is_some());
    // The token lands after the foreign event.
    assert_eq!(outcome.model.processed_position(), 4);
}

#[tokio::test]
async fn test_unknown_kind_from_concurrent_writer_needs_no_retry() {
    let ctx = TestContext::new();
    let session_id = ctx.identified_session("u1").await.unwrap();
    ctx.store.interleave([PendingEvent::new("session.otp.email.checked", json!({}))]);

    let outcome = ctx
        .commands
        .execute(&session_id, Some(OWNER), SessionCommand::SetToken)
        .await
        .unwrap();
    assert_eq!(outcome.attempts, 1);
    assert_eq!(ctx.store.inner().len(), 4);
}

#[tokio::test]
async fn test_create_under_another_owner_reports_existing_session() {
    let ctx = TestContext::new();
    ctx.commands
        .execute("shared-id", Some(OWNER), SessionCommand::Create { user_agent: None })
        .await
        .unwrap();
    let pushes = ctx.store.push_count();

    let err = ctx
        .commands
        .execute("shared-id", Some("org-2"), SessionCommand::Create { user_agent: None })
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), Some("SESSION_002"));
    assert!(!err.is_retryable());
    assert_eq!(ctx.store.push_count(), pushes);
}
