//! Integration tests for the account lifecycle.
//!
//! Covers subscribe/register/login end to end over both a writable remote
//! and the local fallback store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::{Value, json};

use swatchbook::db::accounts::account_id_for;
use swatchbook::models::account::StoredPassword;
use swatchbook::services::accounts::{AuthError, LoginOutcome};
use swatchbook::store::testing::InMemoryRemote;
use swatchbook_core::{Email, Tier};
use swatchbook_integration_tests::{TestContext, Wiring, legacy_digest};

fn account_docs(ctx: &TestContext) -> Vec<Value> {
    ctx.remote
        .documents()
        .into_iter()
        .filter(|d| d["_type"] == "account")
        .collect()
}

// =============================================================================
// Subscribe & Register
// =============================================================================

#[tokio::test]
async fn test_subscribe_then_register_yields_one_member() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    let subscriber = accounts.subscribe("A@Ex.com").await.unwrap();
    assert_eq!(subscriber.tier, Tier::Subscriber);
    assert!(!subscriber.has_password());

    let registration = accounts
        .register("a@ex.com", "secret123", Some("A"))
        .await
        .unwrap();
    let member = registration.account;
    assert_eq!(member.id, subscriber.id);
    assert_eq!(member.tier, Tier::Member);
    assert!(member.has_password());
    assert_eq!(member.name.as_deref(), Some("A"));
    assert!(!registration.verification_token.is_empty());

    assert_eq!(account_docs(&ctx).len(), 1);

    let outcome = accounts.login("a@ex.com", "secret123").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(ref a) if a.id == member.id));

    let wrong = accounts.login("a@ex.com", "wrong").await.unwrap_err();
    let unknown = accounts.login("nobody@ex.com", "secret123").await.unwrap_err();
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert_eq!(wrong.to_string(), unknown.to_string());
}

#[tokio::test]
async fn test_subscribe_is_idempotent_across_email_forms() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    let first = accounts.subscribe("Someone@Example.com").await.unwrap();
    let second = accounts.subscribe("  someone@example.com ").await.unwrap();
    let third = accounts.subscribe("SOMEONE@EXAMPLE.COM").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.id, third.id);
    assert_eq!(account_docs(&ctx).len(), 1);
}

#[tokio::test]
async fn test_mixed_case_stored_email_is_not_duplicated() {
    let remote = InMemoryRemote::with_documents(vec![json!({
        "_id": "legacy-1",
        "_type": "account",
        "email": "A@Ex.com",
        "tier": "subscriber",
    })]);
    let ctx = TestContext::with_remote(Wiring::ReadWrite, false, remote);
    let accounts = ctx.app.accounts();

    let subscriber = accounts.subscribe("a@ex.com").await.unwrap();
    assert_eq!(subscriber.id.as_str(), "legacy-1");

    let member = accounts
        .register("a@EX.com", "secret123", None)
        .await
        .unwrap()
        .account;
    assert_eq!(member.id.as_str(), "legacy-1");
    assert_eq!(member.tier, Tier::Member);
    assert_eq!(account_docs(&ctx).len(), 1);
}

#[tokio::test]
async fn test_subscribe_leaves_members_untouched() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    let member = accounts
        .register("m@ex.com", "secret123", None)
        .await
        .unwrap()
        .account;
    let again = accounts.subscribe("m@ex.com").await.unwrap();

    assert_eq!(again.id, member.id);
    assert_eq!(again.tier, Tier::Member);
    assert!(again.has_password());
}

#[tokio::test]
async fn test_register_twice_is_rejected() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    accounts.register("a@ex.com", "secret123", None).await.unwrap();
    let err = accounts
        .register("A@EX.COM", "another-password", None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::AlreadyRegistered));
    assert_eq!(account_docs(&ctx).len(), 1);
}

#[tokio::test]
async fn test_register_rejects_short_password_and_bad_email() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    assert!(matches!(
        accounts.register("a@ex.com", "short", None).await,
        Err(AuthError::WeakPassword(_))
    ));
    assert!(matches!(
        accounts.register("not-an-email", "secret123", None).await,
        Err(AuthError::InvalidEmail(_))
    ));
    assert!(account_docs(&ctx).is_empty());
}

#[tokio::test]
async fn test_no_operation_demotes_a_member() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    let registration = accounts.register("a@ex.com", "secret123", None).await.unwrap();
    let id = registration.account.id.clone();

    let after_subscribe = accounts.subscribe("a@ex.com").await.unwrap();
    let after_verify = accounts
        .verify_email(&registration.verification_token)
        .await
        .unwrap()
        .unwrap();
    let after_change = accounts
        .change_password("a@ex.com", "secret123", "new-secret-456")
        .await
        .unwrap();
    let after_deactivate = accounts.deactivate("a@ex.com").await.unwrap();

    for account in [after_subscribe, after_verify, after_change, after_deactivate] {
        assert_eq!(account.id, id);
        assert_eq!(account.tier, Tier::Member);
    }
}

// =============================================================================
// Verification
// =============================================================================

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    let token = accounts
        .register("a@ex.com", "secret123", None)
        .await
        .unwrap()
        .verification_token;

    let verified = accounts.verify_email(&token).await.unwrap().unwrap();
    assert!(verified.verified);
    assert!(verified.verification_token.is_none());

    assert!(accounts.verify_email(&token).await.unwrap().is_none());
    assert!(accounts.verify_email("unknown-token").await.unwrap().is_none());
}

// =============================================================================
// Password Migration
// =============================================================================

fn legacy_member(email: &str, password: &str) -> Value {
    let email = Email::parse(email).unwrap();
    json!({
        "_id": account_id_for(&email).as_str(),
        "_type": "account",
        "email": email.as_str(),
        "passwordHash": legacy_digest(password),
        "tier": "member",
        "active": true,
        "verified": true,
    })
}

#[tokio::test]
async fn test_legacy_hash_authenticates_and_is_upgraded() {
    let remote = InMemoryRemote::with_documents(vec![legacy_member("old@ex.com", "legacy-pass")]);
    let ctx = TestContext::with_remote(Wiring::ReadWrite, false, remote);
    let accounts = ctx.app.accounts();

    assert!(accounts.login("old@ex.com", "wrong-pass").await.is_err());

    let outcome = accounts.login("old@ex.com", "legacy-pass").await.unwrap();
    let LoginOutcome::Authenticated(account) = outcome else {
        panic!("expected authentication");
    };
    assert!(matches!(account.password, Some(StoredPassword::Modern(_))));

    let stored = account_docs(&ctx).remove(0);
    assert!(stored["passwordHash"].as_str().unwrap().starts_with("$argon2"));

    // The upgraded hash still verifies.
    assert!(matches!(
        accounts.login("old@ex.com", "legacy-pass").await.unwrap(),
        LoginOutcome::Authenticated(_)
    ));
}

#[tokio::test]
async fn test_password_change_never_writes_legacy_hash() {
    let remote = InMemoryRemote::with_documents(vec![legacy_member("old@ex.com", "legacy-pass")]);
    let ctx = TestContext::with_remote(Wiring::ReadWrite, false, remote);
    let accounts = ctx.app.accounts();

    let updated = accounts
        .change_password("old@ex.com", "legacy-pass", "brand-new-pass")
        .await
        .unwrap();
    assert!(matches!(updated.password, Some(StoredPassword::Modern(_))));

    let stored = account_docs(&ctx).remove(0);
    let hash = stored["passwordHash"].as_str().unwrap();
    assert!(!StoredPassword::parse(hash).is_legacy());
    assert!(accounts.login("old@ex.com", "legacy-pass").await.is_err());
}

// =============================================================================
// Deactivation & Throttling
// =============================================================================

#[tokio::test]
async fn test_deactivated_account_cannot_log_in() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();

    accounts.register("a@ex.com", "secret123", None).await.unwrap();
    let deactivated = accounts.deactivate("a@ex.com").await.unwrap();
    assert!(!deactivated.active);

    assert!(matches!(
        accounts.login("a@ex.com", "secret123").await,
        Err(AuthError::InvalidCredentials)
    ));
    assert!(matches!(
        accounts.deactivate("nobody@ex.com").await,
        Err(AuthError::NotFound)
    ));
}

#[tokio::test]
async fn test_login_is_throttled_after_repeated_failures() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();
    accounts.register("a@ex.com", "secret123", None).await.unwrap();

    let max = ctx.app.config().login_limit.max_attempts;
    for _ in 0..max {
        assert!(accounts.login("a@ex.com", "wrong").await.is_err());
    }

    // Even the right password is refused while throttled.
    let outcome = accounts.login("a@ex.com", "secret123").await.unwrap();
    let LoginOutcome::Throttled(decision) = outcome else {
        panic!("expected throttling");
    };
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0);

    // Other emails have their own window.
    assert!(matches!(
        accounts.login("b@ex.com", "secret123").await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn test_successful_login_resets_attempts() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    let accounts = ctx.app.accounts();
    accounts.register("a@ex.com", "secret123", None).await.unwrap();

    let max = ctx.app.config().login_limit.max_attempts;
    for _ in 1..max {
        assert!(accounts.login("a@ex.com", "wrong").await.is_err());
    }
    assert!(matches!(
        accounts.login("a@ex.com", "secret123").await.unwrap(),
        LoginOutcome::Authenticated(_)
    ));

    for _ in 1..max {
        assert!(accounts.login("a@ex.com", "wrong").await.is_err());
    }
    assert!(matches!(
        accounts.login("a@ex.com", "secret123").await.unwrap(),
        LoginOutcome::Authenticated(_)
    ));
}

// =============================================================================
// Local Fallback
// =============================================================================

#[tokio::test]
async fn test_accounts_work_in_local_only_mode() {
    let ctx = TestContext::new(Wiring::LocalOnly, false);
    let accounts = ctx.app.accounts();

    let subscriber = accounts.subscribe("a@ex.com").await.unwrap();
    assert!(subscriber.id.is_local());

    let member = accounts
        .register("a@ex.com", "secret123", None)
        .await
        .unwrap()
        .account;
    assert_eq!(member.id, subscriber.id);
    assert!(matches!(
        accounts.login("a@ex.com", "secret123").await.unwrap(),
        LoginOutcome::Authenticated(_)
    ));
    assert_eq!(ctx.remote.write_count(), 0);
}

#[tokio::test]
async fn test_accounts_without_write_credential_are_disabled() {
    let ctx = TestContext::new(Wiring::ReadOnly, false);
    let err = ctx.app.accounts().subscribe("a@ex.com").await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::Store(swatchbook::store::StoreError::Disabled)
    ));
}
