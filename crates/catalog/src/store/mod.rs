//! Dual-backend persistence facade.
//!
//! Routes reads and writes between the remote content service and the local
//! fallback store.
//!
//! # Read policy
//!
//! Remote first when configured. Any remote failure (network, auth, shape)
//! degrades silently to the local store. Reads never fail.
//!
//! # Write policy
//!
//! | Remote | Write client | `allow_local_writes` | Destination |
//! |--------|--------------|----------------------|-------------|
//! | yes    | yes          | any                  | remote only |
//! | yes    | no           | `true`               | local, `local-` ids |
//! | yes    | no           | `false`              | [`StoreError::Disabled`] |
//! | no     | -            | any                  | local, failures are warnings |
//!
//! When remote writes are unavailable but local writes are allowed, reads
//! overlay locally written documents on top of remote rows so a write is
//! visible to the next read.

mod error;
mod local;
mod query;
mod remote;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use swatchbook_core::{LOCAL_ID_PREFIX, is_local_id};
use tracing::{debug, warn};
use uuid::Uuid;

pub use error::{ErrorKind, StoreError};
pub use local::{FileStore, LocalStore, LocalStoreError, MemoryStore};
pub use query::{Filter, Order, Query};
pub use remote::{HttpContentClient, Mutation, RemoteContent, RemoteError};

use crate::config::SwatchbookConfig;

/// Local store key prefix for document collections.
const DOCS_KEY_PREFIX: &str = "swatchbook.docs.";

/// Which backend answered a read or took a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Remote,
    Local,
}

/// Operating mode derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No remote service; the local store is primary.
    LocalOnly,
    /// Remote reads, writes rejected.
    RemoteReadOnly,
    /// Remote reads, writes kept locally.
    RemoteWithLocalWrites,
    /// Remote reads and writes.
    RemoteReadWrite,
}

/// Rows returned by a read plus the backend that produced them.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub documents: Vec<Value>,
    pub backend: Backend,
}

/// Field changes applied to an existing document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    set: Map<String, Value>,
    unset: Vec<String>,
}

impl Patch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a top-level field.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Remove a top-level field.
    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Apply to a raw document in place.
    pub fn apply_to(&self, doc: &mut Value) {
        if let Some(obj) = doc.as_object_mut() {
            for (field, value) in &self.set {
                obj.insert(field.clone(), value.clone());
            }
            for field in &self.unset {
                obj.remove(field);
            }
            obj.insert("_updatedAt".to_owned(), Value::String(now_timestamp()));
        }
    }

    fn into_mutation(self, id: &str) -> Mutation {
        Mutation::Patch {
            id: id.to_owned(),
            set: self.set,
            unset: self.unset,
        }
    }
}

/// Remote collaborators: an unauthenticated reader and an optional writer.
#[derive(Clone)]
pub struct RemoteBackend {
    reader: Arc<dyn RemoteContent>,
    writer: Option<Arc<dyn RemoteContent>>,
}

impl RemoteBackend {
    #[must_use]
    pub fn new(reader: Arc<dyn RemoteContent>, writer: Option<Arc<dyn RemoteContent>>) -> Self {
        Self { reader, writer }
    }
}

/// Persistence facade shared by the content and account services.
///
/// Cheap to clone; all clones share the same collaborators.
#[derive(Clone)]
pub struct DataStore {
    inner: Arc<DataStoreInner>,
}

struct DataStoreInner {
    remote: Option<RemoteBackend>,
    local: Arc<dyn LocalStore>,
    allow_local_writes: bool,
}

impl DataStore {
    /// Create a facade from explicit collaborators.
    #[must_use]
    pub fn new(
        remote: Option<RemoteBackend>,
        local: Arc<dyn LocalStore>,
        allow_local_writes: bool,
    ) -> Self {
        Self {
            inner: Arc::new(DataStoreInner {
                remote,
                local,
                allow_local_writes,
            }),
        }
    }

    /// Build HTTP clients and a file-backed local store from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if an HTTP client cannot be constructed.
    pub fn from_config(config: &SwatchbookConfig) -> Result<Self, RemoteError> {
        let remote = match &config.remote {
            Some(remote_config) => {
                let reader: Arc<dyn RemoteContent> =
                    Arc::new(HttpContentClient::reader(remote_config)?);
                let writer = HttpContentClient::writer(remote_config)?
                    .map(|client| Arc::new(client) as Arc<dyn RemoteContent>);
                Some(RemoteBackend::new(reader, writer))
            }
            None => None,
        };

        let local: Arc<dyn LocalStore> = Arc::new(FileStore::new(&config.local_store_dir));
        Ok(Self::new(remote, local, config.allow_local_writes))
    }

    /// Current operating mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match &self.inner.remote {
            None => Mode::LocalOnly,
            Some(RemoteBackend {
                writer: Some(_), ..
            }) => Mode::RemoteReadWrite,
            Some(_) if self.inner.allow_local_writes => Mode::RemoteWithLocalWrites,
            Some(_) => Mode::RemoteReadOnly,
        }
    }

    /// The local fallback medium, shared with other persisted helpers.
    #[must_use]
    pub fn local_store(&self) -> Arc<dyn LocalStore> {
        Arc::clone(&self.inner.local)
    }

    fn local(&self) -> LocalDocuments<'_> {
        LocalDocuments {
            store: self.inner.local.as_ref(),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Run a query against the best available backend.
    pub async fn fetch(&self, query: &Query) -> Fetched {
        let Some(remote) = &self.inner.remote else {
            return Fetched {
                documents: self.local().query(query),
                backend: Backend::Local,
            };
        };

        match remote.reader.fetch(query).await {
            Ok(rows) => {
                let documents = if self.mode() == Mode::RemoteWithLocalWrites {
                    self.overlay_local(query, rows)
                } else {
                    rows
                };
                debug!(doc_type = query.doc_type(), rows = documents.len(), "read from remote");
                Fetched {
                    documents,
                    backend: Backend::Remote,
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    doc_type = query.doc_type(),
                    "remote read failed, falling back to local store"
                );
                Fetched {
                    documents: self.local().query(query),
                    backend: Backend::Local,
                }
            }
        }
    }

    /// Run a query and return its first row.
    pub async fn fetch_one(&self, query: &Query) -> Option<Value> {
        let query = query.clone().limit(1);
        self.fetch(&query).await.documents.into_iter().next()
    }

    /// Replace remote rows with local versions of the same document and
    /// append local-only matches.
    fn overlay_local(&self, query: &Query, rows: Vec<Value>) -> Vec<Value> {
        let local_all = self.local().load(query.doc_type());
        if local_all.is_empty() {
            return rows;
        }

        let mut merged: Vec<Value> = rows
            .into_iter()
            .filter_map(|row| {
                let local = document_id(&row)
                    .and_then(|id| local_all.iter().find(|d| document_id(d) == Some(id)));
                match local {
                    Some(local) if query.matches(local) => Some(local.clone()),
                    Some(_) => None,
                    None => Some(row),
                }
            })
            .collect();

        for doc in query.apply(local_all.iter().cloned()) {
            let id = document_id(&doc);
            if !merged.iter().any(|m| document_id(m) == id) {
                merged.push(doc);
            }
        }

        if let Some(limit) = query.max_results() {
            merged.truncate(limit);
        }
        merged
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn write_route(&self) -> Result<Option<&Arc<dyn RemoteContent>>, StoreError> {
        match &self.inner.remote {
            Some(RemoteBackend {
                writer: Some(writer),
                ..
            }) => Ok(Some(writer)),
            Some(_) if self.inner.allow_local_writes => Ok(None),
            Some(_) => Err(StoreError::Disabled),
            None => Ok(None),
        }
    }

    /// Create a document. Fails with [`StoreError::Duplicate`] if its `_id` is taken.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the write is disabled, rejected, or the
    /// document lacks a `_type`.
    pub async fn create(&self, doc: Value) -> Result<Value, StoreError> {
        let doc_type = doc_type_of(&doc)?;
        match self.write_route()? {
            Some(writer) => {
                let written = writer.mutate(Mutation::Create(doc.clone())).await?;
                debug!(doc_type = %doc_type, "created remote document");
                Ok(if written.is_null() { doc } else { written })
            }
            None => self.local_create(&doc_type, doc, false),
        }
    }

    /// Create a document unless one with the same `_id` already exists, in
    /// which case the existing document is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the write is disabled or rejected, or the
    /// document lacks `_type` or `_id`.
    pub async fn create_if_not_exists(&self, doc: Value) -> Result<Value, StoreError> {
        let doc_type = doc_type_of(&doc)?;
        let id = document_id(&doc)
            .ok_or_else(|| StoreError::Malformed("document has no _id".to_owned()))?
            .to_owned();

        match self.write_route()? {
            Some(writer) => {
                let written = writer.mutate(Mutation::CreateIfNotExists(doc.clone())).await?;
                if !written.is_null() {
                    return Ok(written);
                }
                // The service does not echo a document it left untouched.
                let existing = writer.fetch(&Query::by_id(&doc_type, &id)).await?;
                Ok(existing.into_iter().next().unwrap_or(doc))
            }
            None => self.local_create(&doc_type, doc, true),
        }
    }

    /// Apply field changes to an existing document and return it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the document does not exist, or the
    /// write-policy errors described on [`DataStore`].
    pub async fn patch(&self, doc_type: &str, id: &str, patch: Patch) -> Result<Value, StoreError> {
        match self.write_route()? {
            Some(writer) => {
                let written = writer.mutate(patch.into_mutation(id)).await?;
                if !written.is_null() {
                    return Ok(written);
                }
                writer
                    .fetch(&Query::by_id(doc_type, id))
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| StoreError::NotFound(id.to_owned()))
            }
            None => self.local_patch(doc_type, id, &patch).await,
        }
    }

    /// Delete a document. Deleting a missing local document is not an error.
    ///
    /// # Errors
    ///
    /// Returns the write-policy errors described on [`DataStore`].
    pub async fn delete(&self, doc_type: &str, id: &str) -> Result<(), StoreError> {
        match self.write_route()? {
            Some(writer) => {
                writer
                    .mutate(Mutation::Delete { id: id.to_owned() })
                    .await?;
                Ok(())
            }
            None => {
                let mut docs = self.local().load(doc_type);
                let before = docs.len();
                docs.retain(|d| document_id(d) != Some(id));
                if docs.len() != before {
                    self.persist_local(doc_type, &docs);
                }
                Ok(())
            }
        }
    }

    fn local_create(&self, doc_type: &str, doc: Value, if_not_exists: bool) -> Result<Value, StoreError> {
        let Value::Object(mut obj) = doc else {
            return Err(StoreError::Malformed("document must be an object".to_owned()));
        };

        let id = match obj.get("_id").and_then(Value::as_str) {
            Some(id) if is_local_id(id) => id.to_owned(),
            Some(id) => format!("{LOCAL_ID_PREFIX}{id}"),
            None => format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()),
        };

        let mut docs = self.local().load(doc_type);
        if let Some(existing) = docs.iter().find(|d| document_id(d) == Some(id.as_str())) {
            if if_not_exists {
                return Ok(existing.clone());
            }
            return Err(StoreError::Duplicate(id));
        }

        let now = now_timestamp();
        obj.insert("_id".to_owned(), Value::String(id));
        obj.entry("_createdAt").or_insert_with(|| Value::String(now.clone()));
        obj.insert("_updatedAt".to_owned(), Value::String(now));

        let doc = Value::Object(obj);
        docs.push(doc.clone());
        self.persist_local(doc_type, &docs);
        debug!(doc_type, "created local document");
        Ok(doc)
    }

    async fn local_patch(&self, doc_type: &str, id: &str, patch: &Patch) -> Result<Value, StoreError> {
        let mut docs = self.local().load(doc_type);

        if let Some(doc) = docs.iter_mut().find(|d| document_id(d) == Some(id)) {
            patch.apply_to(doc);
            let updated = doc.clone();
            self.persist_local(doc_type, &docs);
            return Ok(updated);
        }

        // A remote document edited while remote writes are unavailable gets a
        // local shadow copy that reads overlay.
        let remote = self
            .inner
            .remote
            .as_ref()
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        let mut doc = remote
            .reader
            .fetch(&Query::by_id(doc_type, id))
            .await
            .ok()
            .and_then(|rows| rows.into_iter().next())
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;

        patch.apply_to(&mut doc);
        docs.push(doc.clone());
        self.persist_local(doc_type, &docs);
        Ok(doc)
    }

    fn persist_local(&self, doc_type: &str, docs: &[Value]) {
        if let Err(e) = self.local().save(doc_type, docs) {
            warn!(
                error = %e,
                doc_type,
                "local store write failed; change was not persisted"
            );
        }
    }
}

// =============================================================================
// Local document collections
// =============================================================================

/// Typed view over the local store: one JSON array per document type.
struct LocalDocuments<'a> {
    store: &'a dyn LocalStore,
}

impl LocalDocuments<'_> {
    fn key(doc_type: &str) -> String {
        format!("{DOCS_KEY_PREFIX}{doc_type}")
    }

    fn load(&self, doc_type: &str) -> Vec<Value> {
        let raw = match self.store.get(&Self::key(doc_type)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, doc_type, "local store read failed");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, doc_type, "discarding unreadable local collection");
                Vec::new()
            }
        }
    }

    fn save(&self, doc_type: &str, docs: &[Value]) -> Result<(), LocalStoreError> {
        let raw = serde_json::to_string(docs)
            .map_err(|e| LocalStoreError::Unavailable(e.to_string()))?;
        self.store.set(&Self::key(doc_type), &raw)
    }

    fn query(&self, query: &Query) -> Vec<Value> {
        query.apply(self.load(query.doc_type()))
    }
}

fn document_id(doc: &Value) -> Option<&str> {
    doc.get("_id").and_then(Value::as_str)
}

fn doc_type_of(doc: &Value) -> Result<String, StoreError> {
    doc.get("_type")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| StoreError::Malformed("document has no _type".to_owned()))
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
