//! Persistence error types.

use thiserror::Error;

use super::remote::RemoteError;

/// Coarse classification of a failed operation for downstream callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Remote mode is off. An operating mode, not a failure.
    NotConfigured,
    /// Credential missing or rejected.
    PermissionDenied,
    /// A document with the same identity already exists.
    Duplicate,
    /// Local fallback write attempted while disabled.
    Disabled,
    /// Network or backend hiccup.
    Transient,
    /// Unexpected remote shape.
    Malformed,
    /// Anything else.
    Generic,
}

/// Errors surfaced by write operations of the persistence facade.
///
/// Reads never return these; they degrade to local data instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote service is not configured.
    #[error("remote content service is not configured")]
    NotConfigured,

    /// The service rejected the credential.
    #[error("permission denied by content service: {0}")]
    PermissionDenied(String),

    /// Create collided with an existing document.
    #[error("document already exists: {0}")]
    Duplicate(String),

    /// No write credential and local fallback writes are turned off.
    #[error(
        "writes are disabled: no content service write credential is configured and local fallback writes are off (set CONTENT_WRITE_TOKEN or LOCAL_FALLBACK_WRITES=true)"
    )]
    Disabled,

    /// Temporary failure talking to the service.
    #[error("content service unavailable: {0}")]
    Transient(String),

    /// The service answered with an unexpected shape.
    #[error("unexpected content service response: {0}")]
    Malformed(String),

    /// Target document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured => ErrorKind::NotConfigured,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::Disabled => ErrorKind::Disabled,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::NotFound(_) => ErrorKind::Generic,
        }
    }
}

impl From<RemoteError> for StoreError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Api { status, message } => match status {
                401 | 403 => Self::PermissionDenied(message),
                409 => Self::Duplicate(message),
                404 => Self::NotFound(message),
                _ => Self::Transient(format!("HTTP {status}: {message}")),
            },
            RemoteError::MissingCredential => {
                Self::PermissionDenied("no write credential".to_owned())
            }
            RemoteError::Parse(e) => Self::Malformed(e.to_string()),
            RemoteError::Malformed(msg) => Self::Malformed(msg),
            RemoteError::Http(e) => Self::Transient(e.to_string()),
            RemoteError::Endpoint(e) => Self::Transient(e.to_string()),
        }
    }
}
