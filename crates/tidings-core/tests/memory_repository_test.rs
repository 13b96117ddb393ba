//! Integration tests for the in-memory repositories.

use chrono::{Duration, Utc};
use tidings_core::TidingsError;
use tidings_core::memory::{InMemoryAccountRepository, InMemoryActivityRepository};
use tidings_core::models::account::{AccountFlags, CreateAccount, SecurityState};
use tidings_core::models::activity::MessageSummary;
use tidings_core::models::role::Role;
use tidings_core::repository::{AccountRepository, ActivityRepository};
use uuid::Uuid;

fn alice() -> CreateAccount {
    CreateAccount {
        username: "alice".into(),
        display_name: "Alice".into(),
        password_hash: "$argon2id$placeholder".into(),
        flags: AccountFlags::default(),
    }
}

#[tokio::test]
async fn create_and_find_account() {
    let repo = InMemoryAccountRepository::new();
    let account = repo.create(alice()).await.unwrap();

    assert_eq!(account.security, SecurityState::default());
    assert_eq!(account.role(), Role::User);

    let by_name = repo.find_by_username("alice").await.unwrap();
    assert_eq!(by_name.id, account.id);
    let by_id = repo.find_by_id(account.id).await.unwrap();
    assert_eq!(by_id.username, "alice");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let repo = InMemoryAccountRepository::new();
    repo.create(alice()).await.unwrap();

    let err = repo.create(alice()).await.unwrap_err();
    assert!(matches!(err, TidingsError::AlreadyExists { .. }));
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let repo = InMemoryAccountRepository::new();

    assert!(matches!(
        repo.find_by_username("nobody").await.unwrap_err(),
        TidingsError::NotFound { .. }
    ));
    assert!(matches!(
        repo.current_password_epoch(Uuid::new_v4()).await.unwrap_err(),
        TidingsError::NotFound { .. }
    ));
}

#[tokio::test]
async fn failed_login_applies_transition() {
    let repo = InMemoryAccountRepository::new();
    let account = repo.create(alice()).await.unwrap();
    let until = Utc::now() + Duration::minutes(30);

    let state = repo
        .record_failed_login(account.id, |s| SecurityState {
            failed_attempts: s.failed_attempts + 1,
            locked_until: Some(until),
            password_epoch: s.password_epoch,
        })
        .await
        .unwrap();
    assert_eq!(state.failed_attempts, 1);
    assert_eq!(state.locked_until, Some(until));

    repo.record_successful_login(account.id).await.unwrap();
    let stored = repo.find_by_id(account.id).await.unwrap();
    assert_eq!(stored.security.failed_attempts, 0);
    assert!(stored.security.locked_until.is_none());
}

#[tokio::test]
async fn change_password_advances_epoch_and_clears_lock() {
    let repo = InMemoryAccountRepository::new();
    let account = repo.create(alice()).await.unwrap();
    repo.record_failed_login(account.id, |s| SecurityState {
        failed_attempts: 5,
        locked_until: Some(Utc::now() + Duration::minutes(30)),
        password_epoch: s.password_epoch,
    })
    .await
    .unwrap();

    let epoch = repo
        .change_password(account.id, "$argon2id$new".into())
        .await
        .unwrap();
    assert_eq!(epoch, 1);

    let stored = repo.find_by_id(account.id).await.unwrap();
    assert_eq!(stored.password_hash, "$argon2id$new");
    assert_eq!(stored.security.failed_attempts, 0);
    assert!(stored.security.locked_until.is_none());
    assert_eq!(repo.current_password_epoch(account.id).await.unwrap(), 1);
}

#[tokio::test]
async fn flags_update_changes_role() {
    let repo = InMemoryAccountRepository::new();
    let account = repo.create(alice()).await.unwrap();

    let updated = repo
        .set_flags(
            account.id,
            AccountFlags {
                moderator: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.role(), Role::Moderator);
    assert!(updated.flags.moderator);

    let stored = repo.find_by_id(account.id).await.unwrap();
    assert_eq!(stored.flags, updated.flags);
    assert_eq!(stored.updated_at, updated.updated_at);
    assert!(stored.updated_at >= account.updated_at);
}

#[tokio::test]
async fn flags_update_on_unknown_account_is_not_found() {
    let repo = InMemoryAccountRepository::new();

    let result = repo.set_flags(Uuid::new_v4(), AccountFlags::default()).await;
    assert!(matches!(result, Err(TidingsError::NotFound { .. })));
}

#[tokio::test]
async fn activity_tracks_unread_and_latest() {
    let repo = InMemoryActivityRepository::new();
    let user = Uuid::new_v4();

    assert_eq!(repo.unread_count(user).await.unwrap(), 0);
    assert!(repo.latest_item(user).await.unwrap().is_none());

    for preview in ["first", "second"] {
        repo.deliver(
            user,
            MessageSummary {
                id: Uuid::new_v4(),
                sender_name: "Bob".into(),
                preview: preview.into(),
                created_at: Utc::now(),
            },
        )
        .await;
    }

    assert_eq!(repo.unread_count(user).await.unwrap(), 2);
    assert_eq!(repo.latest_item(user).await.unwrap().unwrap().preview, "second");

    repo.mark_all_read(user).await;
    assert_eq!(repo.unread_count(user).await.unwrap(), 0);
}
