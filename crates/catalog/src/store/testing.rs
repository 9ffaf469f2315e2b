//! In-memory remote content service for tests.
//!
//! Evaluates queries with [`Query::apply`] and ignores projections, so stored
//! documents must already carry any fields a projection would dereference.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{Mutation, Patch, Query, RemoteContent, RemoteError};

/// A scriptable [`RemoteContent`] double.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    docs: Mutex<Vec<Value>>,
    failing: AtomicBool,
    rejecting_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_documents(docs: Vec<Value>) -> Self {
        Self {
            docs: Mutex::new(docs),
            ..Self::default()
        }
    }

    /// Make every call fail with a 503.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every mutation fail with a 403.
    pub fn set_rejecting_writes(&self, rejecting: bool) {
        self.rejecting_writes.store(rejecting, Ordering::SeqCst);
    }

    /// Snapshot of stored documents.
    #[must_use]
    pub fn documents(&self) -> Vec<Value> {
        self.lock().clone()
    }

    pub fn insert(&self, doc: Value) {
        self.lock().push(doc);
    }

    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 503,
                message: "service unavailable".to_owned(),
            });
        }
        Ok(())
    }
}

fn id_of(doc: &Value) -> Option<&str> {
    doc.get("_id").and_then(Value::as_str)
}

fn not_found(id: &str) -> RemoteError {
    RemoteError::Api {
        status: 404,
        message: format!("document {id} not found"),
    }
}

#[async_trait]
impl RemoteContent for InMemoryRemote {
    async fn fetch(&self, query: &Query) -> Result<Vec<Value>, RemoteError> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(query.apply(self.lock().iter().cloned()))
    }

    async fn mutate(&self, mutation: Mutation) -> Result<Value, RemoteError> {
        self.check_available()?;
        if self.rejecting_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 403,
                message: "insufficient permissions".to_owned(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut docs = self.lock();
        match mutation {
            Mutation::Create(mut doc) | Mutation::CreateIfNotExists(mut doc) if id_of(&doc).is_none() => {
                if let Some(obj) = doc.as_object_mut() {
                    obj.insert("_id".to_owned(), Value::String(Uuid::new_v4().to_string()));
                }
                docs.push(doc.clone());
                Ok(doc)
            }
            Mutation::Create(doc) => {
                let id = id_of(&doc).unwrap_or_default();
                if docs.iter().any(|d| id_of(d) == Some(id)) {
                    return Err(RemoteError::Api {
                        status: 409,
                        message: format!("document {id} already exists"),
                    });
                }
                docs.push(doc.clone());
                Ok(doc)
            }
            Mutation::CreateIfNotExists(doc) => {
                let id = id_of(&doc).unwrap_or_default();
                // An existing document is left alone and nothing is echoed.
                if docs.iter().any(|d| id_of(d) == Some(id)) {
                    return Ok(Value::Null);
                }
                docs.push(doc.clone());
                Ok(doc)
            }
            Mutation::Patch { id, set, unset } => {
                let doc = docs
                    .iter_mut()
                    .find(|d| id_of(d) == Some(id.as_str()))
                    .ok_or_else(|| not_found(&id))?;
                let mut patch = Patch::new();
                for (field, value) in set {
                    patch = patch.set(field, value);
                }
                for field in unset {
                    patch = patch.unset(field);
                }
                patch.apply_to(doc);
                Ok(doc.clone())
            }
            Mutation::Delete { id } => {
                docs.retain(|d| id_of(d) != Some(id.as_str()));
                Ok(Value::Null)
            }
        }
    }
}
