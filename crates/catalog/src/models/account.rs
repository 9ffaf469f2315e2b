//! Account domain types.
//!
//! [`AccountDocument`] is the stored shape shared by both backends;
//! [`UserAccount`] is the validated domain object built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use swatchbook_core::{AccountId, Email, Tier};

/// Document type of account records.
pub const ACCOUNT_TYPE: &str = "account";

/// A stored password hash, classified once when the account is loaded.
#[derive(Clone, PartialEq, Eq)]
pub enum StoredPassword {
    /// Argon2 PHC string.
    Modern(String),
    /// Unsalted SHA-256 hex digest. Verified, never written.
    Legacy(String),
    /// Anything else. Never verifies.
    Unrecognized,
}

impl StoredPassword {
    /// Classify a stored hash by its scheme.
    #[must_use]
    pub fn parse(hash: &str) -> Self {
        if hash.starts_with("$argon2") {
            Self::Modern(hash.to_owned())
        } else if hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            Self::Legacy(hash.to_ascii_lowercase())
        } else {
            Self::Unrecognized
        }
    }

    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

impl std::fmt::Debug for StoredPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self {
            Self::Modern(_) => "Modern",
            Self::Legacy(_) => "Legacy",
            Self::Unrecognized => "Unrecognized",
        };
        write!(f, "StoredPassword::{scheme}([REDACTED])")
    }
}

/// An account (domain type).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: AccountId,
    pub email: Email,
    #[serde(skip)]
    pub password: Option<StoredPassword>,
    pub tier: Tier,
    pub active: bool,
    pub verified: bool,
    #[serde(skip)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

/// Stored account shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_type")]
    pub doc_type: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "_createdAt", default, skip_serializing)]
    pub system_created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl AccountDocument {
    /// A new document for `email` with the given id.
    #[must_use]
    pub fn new(id: &AccountId, email: &Email, tier: Tier) -> Self {
        Self {
            id: Some(id.as_str().to_owned()),
            doc_type: ACCOUNT_TYPE.to_owned(),
            email: email.as_str().to_owned(),
            password_hash: None,
            tier,
            active: true,
            verified: false,
            verification_token: None,
            name: None,
            created_at: Some(Utc::now()),
            system_created_at: None,
            updated_at: None,
        }
    }

    /// Validate into a domain account.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the id or email is unusable.
    pub fn into_account(self) -> Result<UserAccount, String> {
        let id = self.id.ok_or("account document has no _id")?;
        let email =
            Email::parse(&self.email).map_err(|e| format!("invalid email in account {id}: {e}"))?;

        Ok(UserAccount {
            id: AccountId::new(id),
            email,
            password: self.password_hash.as_deref().map(StoredPassword::parse),
            tier: self.tier,
            active: self.active,
            verified: self.verified,
            verification_token: self.verification_token,
            name: self.name,
            created_at: self
                .created_at
                .or(self.system_created_at)
                .unwrap_or_default(),
            updated_at: self.updated_at,
        })
    }
}
