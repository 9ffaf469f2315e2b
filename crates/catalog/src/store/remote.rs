//! Remote content service client.
//!
//! Reads go through the public query endpoint and need no credential.
//! Mutations go through the mutate endpoint with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use super::query::Query;
use crate::config::RemoteConfig;

/// Errors that can occur when talking to the remote content service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// Body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Body was JSON but not the expected shape.
    #[error("unexpected response shape: {0}")]
    Malformed(String),

    /// A mutation was attempted without a credential.
    #[error("no write credential configured")]
    MissingCredential,

    /// Endpoint URL could not be built.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// A single document mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create a document; fails if its `_id` is taken.
    Create(Value),
    /// Create a document unless one with the same `_id` exists.
    CreateIfNotExists(Value),
    /// Set and unset top-level fields on an existing document.
    Patch {
        /// Target document ID.
        id: String,
        /// Fields to set.
        set: Map<String, Value>,
        /// Fields to remove.
        unset: Vec<String>,
    },
    /// Delete a document by ID.
    Delete {
        /// Target document ID.
        id: String,
    },
}

impl Mutation {
    /// Wire form understood by the mutate endpoint.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Create(doc) => json!({ "create": doc }),
            Self::CreateIfNotExists(doc) => json!({ "createIfNotExists": doc }),
            Self::Patch { id, set, unset } => {
                let mut patch = Map::new();
                patch.insert("id".to_owned(), Value::String(id.clone()));
                if !set.is_empty() {
                    patch.insert("set".to_owned(), Value::Object(set.clone()));
                }
                if !unset.is_empty() {
                    patch.insert("unset".to_owned(), json!(unset));
                }
                json!({ "patch": patch })
            }
            Self::Delete { id } => json!({ "delete": { "id": id } }),
        }
    }
}

/// The remote structured-content backend.
#[async_trait]
pub trait RemoteContent: Send + Sync {
    /// Run a query and return its rows.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport, status or shape failures.
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, RemoteError>;

    /// Apply a mutation and return the resulting document
    /// (`Value::Null` when the service does not echo one).
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport, status or shape failures.
    async fn mutate(&self, mutation: Mutation) -> Result<Value, RemoteError>;
}

// =============================================================================
// HttpContentClient
// =============================================================================

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
struct MutateResult {
    #[serde(default)]
    document: Option<Value>,
}

/// HTTP implementation of [`RemoteContent`].
#[derive(Clone)]
pub struct HttpContentClient {
    client: reqwest::Client,
    base: Url,
    dataset: String,
    token: Option<SecretString>,
}

impl std::fmt::Debug for HttpContentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpContentClient")
            .field("base", &self.base.as_str())
            .field("dataset", &self.dataset)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpContentClient {
    /// Create an unauthenticated client for reads.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is invalid or the HTTP client fails to build.
    pub fn reader(config: &RemoteConfig) -> Result<Self, RemoteError> {
        Self::build(config, None)
    }

    /// Create an authenticated client for writes, or `None` without a token.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL is invalid or the HTTP client fails to build.
    pub fn writer(config: &RemoteConfig) -> Result<Option<Self>, RemoteError> {
        if !config.can_write() {
            return Ok(None);
        }
        Self::build(config, config.write_token.clone()).map(Some)
    }

    fn build(config: &RemoteConfig, token: Option<SecretString>) -> Result<Self, RemoteError> {
        let base = Url::parse(&format!(
            "https://{}.api.sanity.io/v{}/",
            config.project_id, config.api_version
        ))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base,
            dataset: config.dataset.clone(),
            token,
        })
    }

    fn endpoint(&self, action: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(&format!("data/{action}/{}", self.dataset))?)
    }

    async fn read_body(response: reqwest::Response) -> Result<String, RemoteError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl RemoteContent for HttpContentClient {
    #[instrument(skip(self), fields(doc_type = query.doc_type()))]
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, RemoteError> {
        let (text, params) = query.to_remote();

        let mut url = self.endpoint("query")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", &text);
            for (name, value) in &params {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }

        let mut request = self.client.get(url);
        // Authenticated reads also see drafts the token can access.
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let body = Self::read_body(request.send().await?).await?;
        let response: QueryResponse = serde_json::from_str(&body)?;

        let rows = match response.result {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            row @ Value::Object(_) => vec![row],
            other => {
                return Err(RemoteError::Malformed(format!(
                    "expected rows, got {other}"
                )));
            }
        };

        debug!(rows = rows.len(), "remote query complete");
        Ok(rows)
    }

    #[instrument(skip(self, mutation))]
    async fn mutate(&self, mutation: Mutation) -> Result<Value, RemoteError> {
        let token = self.token.as_ref().ok_or(RemoteError::MissingCredential)?;

        let mut url = self.endpoint("mutate")?;
        url.query_pairs_mut()
            .append_pair("returnDocuments", "true")
            .append_pair("visibility", "sync");

        let body = json!({ "mutations": [mutation.to_wire()] });
        let response = self
            .client
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let response: MutateResponse = serde_json::from_str(&body)?;

        Ok(response
            .results
            .into_iter()
            .next()
            .and_then(|r| r.document)
            .unwrap_or(Value::Null))
    }
}
