//! Swatchbook configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Remote mode (both or neither)
//! - `CONTENT_PROJECT_ID` - Remote content service project identifier
//! - `CONTENT_DATASET` - Remote dataset (namespace) to query
//!
//! ## Optional
//! - `CONTENT_API_VERSION` - Query API version (default: 2024-01-01)
//! - `CONTENT_CDN_HOST` - Image CDN host (default: cdn.sanity.io)
//! - `CONTENT_WRITE_TOKEN` - Bearer credential enabling remote writes
//! - `LOCAL_FALLBACK_WRITES` - Permit local writes when no write token is set (default: false)
//! - `LOCAL_STORE_DIR` - Directory backing the local fallback store (default: .swatchbook)
//! - `LOGIN_MAX_ATTEMPTS` - Login attempts allowed per window (default: 5)
//! - `LOGIN_WINDOW_SECS` - Login rate-limit window in seconds (default: 900)

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

const DEFAULT_API_VERSION: &str = "2024-01-01";
const DEFAULT_CDN_HOST: &str = "cdn.sanity.io";
const DEFAULT_LOCAL_STORE_DIR: &str = ".swatchbook";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Swatchbook application configuration.
#[derive(Debug, Clone)]
pub struct SwatchbookConfig {
    /// Remote content service settings; `None` means local-only mode.
    pub remote: Option<RemoteConfig>,
    /// Whether writes may land in the local store when no write token is configured.
    ///
    /// One switch for every document type.
    pub allow_local_writes: bool,
    /// Directory backing the file-based local store.
    pub local_store_dir: PathBuf,
    /// Limits applied to login attempts.
    pub login_limit: RateLimitConfig,
}

/// Remote content service configuration.
///
/// Implements `Debug` manually to redact the write token.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Project identifier (e.g., `a1b2c3d4`)
    pub project_id: String,
    /// Dataset within the project (e.g., `production`)
    pub dataset: String,
    /// Query API version date
    pub api_version: String,
    /// Host serving transformed images
    pub cdn_host: String,
    /// Bearer credential for mutations
    pub write_token: Option<SecretString>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("cdn_host", &self.cdn_host)
            .field(
                "write_token",
                &self.write_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl RemoteConfig {
    /// Create a read-only remote configuration with default API version and CDN host.
    #[must_use]
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            cdn_host: DEFAULT_CDN_HOST.to_owned(),
            write_token: None,
        }
    }

    /// Whether an authenticated write client can be built.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.write_token
            .as_ref()
            .is_some_and(|token| !token.expose_secret().is_empty())
    }
}

impl SwatchbookConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if only half of the remote settings are present,
    /// if a numeric or boolean variable does not parse, or if the write token
    /// looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`SwatchbookConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let remote = match (vars.optional("CONTENT_PROJECT_ID"), vars.optional("CONTENT_DATASET")) {
            (Some(project_id), Some(dataset)) => {
                let write_token = vars
                    .optional("CONTENT_WRITE_TOKEN")
                    .map(|token| {
                        validate_secret_strength(&token, "CONTENT_WRITE_TOKEN")?;
                        Ok::<_, ConfigError>(SecretString::from(token))
                    })
                    .transpose()?;

                Some(RemoteConfig {
                    project_id,
                    dataset,
                    api_version: vars.or_default("CONTENT_API_VERSION", DEFAULT_API_VERSION),
                    cdn_host: vars.or_default("CONTENT_CDN_HOST", DEFAULT_CDN_HOST),
                    write_token,
                })
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("CONTENT_DATASET".to_owned())),
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("CONTENT_PROJECT_ID".to_owned()));
            }
        };

        let allow_local_writes = vars.flag("LOCAL_FALLBACK_WRITES")?;
        let local_store_dir =
            PathBuf::from(vars.or_default("LOCAL_STORE_DIR", DEFAULT_LOCAL_STORE_DIR));

        let defaults = RateLimitConfig::default();
        let max_attempts = vars.parsed("LOGIN_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "LOGIN_MAX_ATTEMPTS".to_owned(),
                "must be at least 1".to_owned(),
            ));
        }
        let window_secs = vars.parsed("LOGIN_WINDOW_SECS", defaults.window.as_secs())?;

        Ok(Self {
            remote,
            allow_local_writes,
            local_store_dir,
            login_limit: RateLimitConfig {
                max_attempts,
                window: Duration::from_secs(window_secs),
            },
        })
    }

    /// Returns `true` when a remote content service is configured.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.remote.is_some()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
        })
    }

    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("0" | "false" | "no" | "off") => Ok(false),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some(other) => Err(ConfigError::InvalidEnvVar(
                key.to_owned(),
                format!("expected a boolean, got '{other}'"),
            )),
        }
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token issued by the content service."
            ),
        ));
    }

    Ok(())
}
