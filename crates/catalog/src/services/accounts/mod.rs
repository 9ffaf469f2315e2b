//! Account service.
//!
//! Two tiers: password-less subscribers and password-holding members.
//! Accounts move subscriber → member (unverified) → member (verified) and
//! are never demoted or hard-deleted.

mod error;
mod password;

pub use error::AuthError;
pub use password::MIN_PASSWORD_LENGTH;

use tracing::{debug, info, warn};

use swatchbook_core::{Email, Tier};

use crate::db::accounts::AccountRepository;
use crate::models::account::{StoredPassword, UserAccount};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::store::{DataStore, Patch, StoreError};

use password::{
    generate_token, hash_password, validate_password, verify_dummy_password, verify_password,
};

/// A new or promoted member plus the token to deliver out of band.
#[derive(Debug, Clone)]
pub struct Registration {
    pub account: UserAccount,
    pub verification_token: String,
}

/// Result of a login attempt that did not error.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(Box<UserAccount>),
    /// Too many attempts for this email; retry after `reset_at`.
    Throttled(RateDecision),
}

/// Account service.
///
/// Handles subscription, registration, login and email verification.
pub struct AccountService<'a> {
    accounts: AccountRepository<'a>,
    limiter: &'a RateLimiter,
}

impl<'a> AccountService<'a> {
    /// Create a new account service.
    #[must_use]
    pub const fn new(store: &'a DataStore, limiter: &'a RateLimiter) -> Self {
        Self {
            accounts: AccountRepository::new(store),
            limiter,
        }
    }

    // =========================================================================
    // Subscription & Registration
    // =========================================================================

    /// Subscribe an email. Repeating the call returns the same account.
    ///
    /// An inactive account is re-activated with its tier unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::Store` if the write fails.
    pub async fn subscribe(&self, email: &str) -> Result<UserAccount, AuthError> {
        let email = Email::parse(email)?;

        if let Some(account) = self.accounts.get_by_email(&email).await {
            if account.active {
                debug!(account = %account.id, "already subscribed");
                return Ok(account);
            }
            info!(account = %account.id, "re-activating account");
            return Ok(self
                .accounts
                .update(&account.id, Patch::new().set("active", true))
                .await?);
        }

        let account = self.accounts.create_subscriber(&email).await?;
        info!(account = %account.id, "subscriber created");
        Ok(account)
    }

    /// Register a member with a password.
    ///
    /// A subscriber with the same email is promoted in place and keeps its id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::AlreadyRegistered` if a member exists for the email.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Registration, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        let existing = self.accounts.get_by_email(&email).await;
        if existing.as_ref().is_some_and(|a| a.tier == Tier::Member) {
            return Err(AuthError::AlreadyRegistered);
        }

        let password_hash = hash_password(password).await?;
        let token = generate_token();
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        let account = match existing {
            Some(subscriber) => {
                let mut patch = Patch::new()
                    .set("passwordHash", password_hash)
                    .set("tier", Tier::Member.as_str())
                    .set("active", true)
                    .set("verified", false)
                    .set("verificationToken", token.clone());
                if let Some(name) = name {
                    patch = patch.set("name", name);
                }
                let account = self.accounts.update(&subscriber.id, patch).await?;
                info!(account = %account.id, "subscriber promoted to member");
                account
            }
            None => {
                let account = self
                    .accounts
                    .create_member(&email, &password_hash, name, &token)
                    .await
                    .map_err(|e| match e {
                        StoreError::Duplicate(_) => AuthError::AlreadyRegistered,
                        other => AuthError::Store(other),
                    })?;
                info!(account = %account.id, "member registered");
                account
            }
        };

        Ok(Registration {
            account,
            verification_token: token,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in with email and password.
    ///
    /// Attempts are rate limited per email. Unknown, inactive, password-less
    /// and wrong-password cases all fail with the same error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let limit_key = format!("login:{email}");
        let decision = self.limiter.check(&limit_key);
        if !decision.allowed {
            warn!(remaining = decision.remaining, "login throttled");
            return Ok(LoginOutcome::Throttled(decision));
        }

        let account = self.authenticate(&email, password).await?;
        self.limiter.reset(&limit_key);
        Ok(LoginOutcome::Authenticated(Box::new(account)))
    }

    /// Change the password of an authenticated member.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the current password is wrong.
    /// Returns `AuthError::WeakPassword` if the new password doesn't meet requirements.
    pub async fn change_password(
        &self,
        email: &str,
        current: &str,
        new: &str,
    ) -> Result<UserAccount, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        validate_password(new)?;

        let account = self.authenticate(&email, current).await?;
        let password_hash = hash_password(new).await?;
        Ok(self
            .accounts
            .update(&account.id, Patch::new().set("passwordHash", password_hash))
            .await?)
    }

    /// Verify an email by its single-use token.
    ///
    /// Returns `None` if no account holds the token, including a token that
    /// was already used.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if the write fails.
    pub async fn verify_email(&self, token: &str) -> Result<Option<UserAccount>, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }

        let Some(account) = self.accounts.get_by_verification_token(token).await else {
            return Ok(None);
        };

        let account = self
            .accounts
            .update(
                &account.id,
                Patch::new().set("verified", true).unset("verificationToken"),
            )
            .await?;
        info!(account = %account.id, "email verified");
        Ok(Some(account))
    }

    /// Soft-delete an account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if no account exists for the email.
    pub async fn deactivate(&self, email: &str) -> Result<UserAccount, AuthError> {
        let email = Email::parse(email)?;
        let account = self
            .accounts
            .get_by_email(&email)
            .await
            .ok_or(AuthError::NotFound)?;

        if !account.active {
            return Ok(account);
        }
        Ok(self
            .accounts
            .update(&account.id, Patch::new().set("active", false))
            .await?)
    }

    /// Check credentials and migrate legacy hashes.
    async fn authenticate(&self, email: &Email, password: &str) -> Result<UserAccount, AuthError> {
        let found = self
            .accounts
            .get_by_email(email)
            .await
            .filter(|a| a.active)
            .and_then(|a| a.password.clone().map(|stored| (a, stored)));
        let Some((account, stored)) = found else {
            verify_dummy_password(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &stored).await {
            return Err(AuthError::InvalidCredentials);
        }

        if matches!(stored, StoredPassword::Legacy(_)) {
            return Ok(self.upgrade_legacy_hash(account, password).await);
        }
        Ok(account)
    }

    /// Replace a legacy digest with an Argon2 hash. Best-effort.
    async fn upgrade_legacy_hash(&self, account: UserAccount, password: &str) -> UserAccount {
        let hash = match hash_password(password).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(account = %account.id, error = %e, "failed to rehash legacy password");
                return account;
            }
        };

        match self
            .accounts
            .update(&account.id, Patch::new().set("passwordHash", hash))
            .await
        {
            Ok(updated) => {
                info!(account = %updated.id, "legacy password hash upgraded");
                updated
            }
            Err(e) => {
                warn!(account = %account.id, error = %e, "failed to store upgraded password hash");
                account
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::rate_limit::RateLimitConfig;
    use crate::store::MemoryStore;

    fn fixture() -> (DataStore, RateLimiter) {
        let local = Arc::new(MemoryStore::new());
        let store = DataStore::new(None, local.clone(), false);
        let limiter = RateLimiter::new(local, RateLimitConfig::default());
        (store, limiter)
    }

    #[tokio::test]
    async fn test_subscribe_twice_creates_one_account() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);

        let a = service.subscribe("A@Ex.com").await.unwrap();
        let b = service.subscribe(" a@ex.com ").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.tier, Tier::Subscriber);
        assert!(!a.has_password());
    }

    #[tokio::test]
    async fn test_register_promotes_subscriber_in_place() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);

        let subscriber = service.subscribe("a@ex.com").await.unwrap();
        let registration = service
            .register("a@ex.com", "secret123", Some("A"))
            .await
            .unwrap();

        let account = registration.account;
        assert_eq!(account.id, subscriber.id);
        assert_eq!(account.tier, Tier::Member);
        assert!(!account.verified);
        assert_eq!(account.name.as_deref(), Some("A"));
        assert_eq!(
            account.verification_token.as_deref(),
            Some(registration.verification_token.as_str())
        );
    }

    #[tokio::test]
    async fn test_register_twice_is_rejected() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);

        service.register("a@ex.com", "secret123", None).await.unwrap();
        let err = service
            .register("A@EX.com", "another123", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn test_weak_password_is_rejected() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);
        let err = service.register("a@ex.com", "short", None).await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);
        service.subscribe("sub@ex.com").await.unwrap();
        service.register("member@ex.com", "secret123", None).await.unwrap();

        for (email, password) in [
            ("nobody@ex.com", "secret123"),
            ("sub@ex.com", "secret123"),
            ("member@ex.com", "wrong-password"),
            ("not-an-email", "secret123"),
        ] {
            let err = service.login(email, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials), "{email}");
        }

        let outcome = service.login("member@ex.com", "secret123").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn test_login_is_throttled_and_reset_on_success() {
        let local = Arc::new(MemoryStore::new());
        let store = DataStore::new(None, local.clone(), false);
        let limiter = RateLimiter::new(
            local,
            RateLimitConfig {
                max_attempts: 2,
                window: std::time::Duration::from_secs(60),
            },
        );
        let service = AccountService::new(&store, &limiter);
        service.register("a@ex.com", "secret123", None).await.unwrap();

        assert!(service.login("a@ex.com", "bad-guess").await.is_err());
        let outcome = service.login("a@ex.com", "secret123").await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));

        // The success cleared the window.
        assert!(service.login("a@ex.com", "bad-guess").await.is_err());
        assert!(service.login("a@ex.com", "bad-guess").await.is_err());
        let throttled = service.login("a@ex.com", "secret123").await.unwrap();
        let LoginOutcome::Throttled(decision) = throttled else {
            panic!("expected throttling");
        };
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_legacy_hash_is_upgraded_on_login() {
        use sha2::{Digest, Sha256};

        let (store, limiter) = fixture();
        let digest: String = Sha256::digest(b"secret123")
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        store
            .create(serde_json::json!({
                "_id": "legacy-1",
                "_type": "account",
                "email": "old@ex.com",
                "tier": "member",
                "passwordHash": digest,
            }))
            .await
            .unwrap();

        let service = AccountService::new(&store, &limiter);
        let LoginOutcome::Authenticated(account) =
            service.login("old@ex.com", "secret123").await.unwrap()
        else {
            panic!("expected login");
        };
        assert!(matches!(account.password, Some(StoredPassword::Modern(_))));

        // The upgraded hash keeps working.
        assert!(service.login("old@ex.com", "secret123").await.is_ok());
        assert!(service.login("old@ex.com", "wrong-pass").await.is_err());
    }

    #[tokio::test]
    async fn test_verify_email_is_single_use() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);
        let registration = service.register("a@ex.com", "secret123", None).await.unwrap();

        let verified = service
            .verify_email(&registration.verification_token)
            .await
            .unwrap()
            .unwrap();
        assert!(verified.verified);
        assert!(verified.verification_token.is_none());

        assert!(
            service
                .verify_email(&registration.verification_token)
                .await
                .unwrap()
                .is_none()
        );
        assert!(service.verify_email("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_and_deactivate() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);
        service.register("a@ex.com", "secret123", None).await.unwrap();

        assert!(matches!(
            service.change_password("a@ex.com", "wrong-pass", "newsecret1").await,
            Err(AuthError::InvalidCredentials)
        ));
        service
            .change_password("a@ex.com", "secret123", "newsecret1")
            .await
            .unwrap();
        assert!(service.login("a@ex.com", "newsecret1").await.is_ok());

        let deactivated = service.deactivate("a@ex.com").await.unwrap();
        assert!(!deactivated.active);
        assert!(matches!(
            service.login("a@ex.com", "newsecret1").await,
            Err(AuthError::InvalidCredentials)
        ));

        // Subscribing again re-activates without demotion.
        let back = service.subscribe("a@ex.com").await.unwrap();
        assert!(back.active);
        assert_eq!(back.tier, Tier::Member);

        assert!(matches!(
            service.deactivate("nobody@ex.com").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_login_without_usable_hash_is_rejected_uniformly() {
        let (store, limiter) = fixture();
        let service = AccountService::new(&store, &limiter);
        service.subscribe("sub@ex.com").await.unwrap();
        service.register("gone@ex.com", "secret123", None).await.unwrap();
        service.deactivate("gone@ex.com").await.unwrap();

        for email in ["nobody@ex.com", "sub@ex.com", "gone@ex.com"] {
            let err = service.login(email, "secret123").await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials), "{email}");
        }
    }
}
