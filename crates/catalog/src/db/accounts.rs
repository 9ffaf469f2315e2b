//! Account repository.
//!
//! Reads and writes account documents through the [`DataStore`], so the same
//! code serves the remote service and the local fallback store.

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use swatchbook_core::{AccountId, Email, Tier};

use crate::models::account::{ACCOUNT_TYPE, AccountDocument, UserAccount};
use crate::store::{DataStore, Patch, Query, StoreError};

/// Deterministic id for an email: `account-` + 32 hex chars of its SHA-256.
#[must_use]
pub fn account_id_for(email: &Email) -> AccountId {
    let digest = Sha256::digest(email.as_str().as_bytes());
    let hex: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    AccountId::new(format!("account-{hex}"))
}

/// Repository for account documents.
pub struct AccountRepository<'a> {
    store: &'a DataStore,
}

impl<'a> AccountRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a DataStore) -> Self {
        Self { store }
    }

    /// Get the account for an email, preferring an active one. The stored
    /// address is matched case-insensitively.
    ///
    /// Reads never fail; an unreachable backend behaves like a missing account.
    pub async fn get_by_email(&self, email: &Email) -> Option<UserAccount> {
        // Stored rows may predate normalization and carry mixed case.
        let query = Query::documents(ACCOUNT_TYPE).filter_eq_ignore_case("email", email.as_str());
        let accounts = decode_rows(self.store.fetch(&query).await.documents);

        let mut fallback = None;
        for account in accounts {
            if account.active {
                return Some(account);
            }
            fallback.get_or_insert(account);
        }
        fallback
    }

    /// Get the account holding a verification token.
    pub async fn get_by_verification_token(&self, token: &str) -> Option<UserAccount> {
        let query = Query::documents(ACCOUNT_TYPE)
            .filter_eq("verificationToken", token)
            .limit(1);
        decode_rows(self.store.fetch(&query).await.documents)
            .into_iter()
            .next()
    }

    /// Create a password-less subscriber, or return the account already
    /// stored under the email's deterministic id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write is disabled or rejected.
    pub async fn create_subscriber(&self, email: &Email) -> Result<UserAccount, StoreError> {
        let doc = AccountDocument::new(&account_id_for(email), email, Tier::Subscriber);
        let written = self.store.create_if_not_exists(to_value(&doc)?).await?;
        decode(written)
    }

    /// Create an unverified member.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if an account with the email's
    /// deterministic id exists, or other `StoreError`s if the write fails.
    pub async fn create_member(
        &self,
        email: &Email,
        password_hash: &str,
        name: Option<&str>,
        verification_token: &str,
    ) -> Result<UserAccount, StoreError> {
        let mut doc = AccountDocument::new(&account_id_for(email), email, Tier::Member);
        doc.password_hash = Some(password_hash.to_owned());
        doc.verification_token = Some(verification_token.to_owned());
        doc.name = name.map(str::to_owned);

        let written = self.store.create(to_value(&doc)?).await?;
        decode(written)
    }

    /// Apply field changes and return the updated account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the account is missing or the write fails.
    pub async fn update(&self, id: &AccountId, patch: Patch) -> Result<UserAccount, StoreError> {
        let patch = patch.set("updatedAt", chrono::Utc::now().to_rfc3339());
        let written = self.store.patch(ACCOUNT_TYPE, id.as_str(), patch).await?;
        decode(written)
    }
}

fn to_value(doc: &AccountDocument) -> Result<Value, StoreError> {
    serde_json::to_value(doc).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn decode(row: Value) -> Result<UserAccount, StoreError> {
    serde_json::from_value::<AccountDocument>(row)
        .map_err(|e| e.to_string())
        .and_then(AccountDocument::into_account)
        .map_err(StoreError::Malformed)
}

fn decode_rows(rows: Vec<Value>) -> Vec<UserAccount> {
    rows.into_iter()
        .filter_map(|row| {
            decode(row)
                .map_err(|e| warn!(error = %e, "skipping undecodable account"))
                .ok()
        })
        .collect()
}
