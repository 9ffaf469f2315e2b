//! Account error types.

use thiserror::Error;

use crate::store::{ErrorKind, StoreError};

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] swatchbook_core::EmailError),

    /// Wrong password, unknown account or inactive account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A member account already exists for the email.
    #[error("an account is already registered for this email")]
    AlreadyRegistered,

    /// No account for the email.
    #[error("account not found")]
    NotFound,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Classify for downstream callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::AlreadyRegistered => ErrorKind::Duplicate,
            _ => ErrorKind::Generic,
        }
    }
}
