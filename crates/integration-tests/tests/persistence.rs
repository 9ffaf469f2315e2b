//! Integration tests for read/write routing between the remote service and
//! the local fallback store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use serde_json::json;

use swatchbook::store::testing::InMemoryRemote;
use swatchbook::store::{
    Backend, DataStore, ErrorKind, LocalStore, MemoryStore, Mode, Patch, Query, RemoteBackend,
    RemoteContent, StoreError,
};
use swatchbook_core::is_local_id;
use swatchbook_integration_tests::{TestContext, Wiring};

fn note(id: &str, body: &str) -> serde_json::Value {
    json!({ "_id": id, "_type": "note", "body": body })
}

// =============================================================================
// Modes
// =============================================================================

#[test]
fn test_mode_follows_wiring() {
    assert_eq!(TestContext::new(Wiring::LocalOnly, false).app.store().mode(), Mode::LocalOnly);
    assert_eq!(TestContext::new(Wiring::ReadOnly, false).app.store().mode(), Mode::RemoteReadOnly);
    assert_eq!(
        TestContext::new(Wiring::ReadOnly, true).app.store().mode(),
        Mode::RemoteWithLocalWrites
    );
    assert_eq!(TestContext::new(Wiring::ReadWrite, true).app.store().mode(), Mode::RemoteReadWrite);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_write_without_credential_is_disabled() {
    let ctx = TestContext::new(Wiring::ReadOnly, false);
    let err = ctx.app.store().create(note("n1", "hello")).await.unwrap_err();

    assert!(matches!(err, StoreError::Disabled));
    assert_eq!(err.kind(), ErrorKind::Disabled);
    assert!(err.to_string().contains("write"));
    assert!(ctx.local.is_empty());
    assert_eq!(ctx.remote.write_count(), 0);
}

#[tokio::test]
async fn test_write_without_credential_lands_locally_when_allowed() {
    let ctx = TestContext::new(Wiring::ReadOnly, true);
    let written = ctx.app.store().create(note("n1", "hello")).await.unwrap();

    let id = written["_id"].as_str().unwrap();
    assert!(is_local_id(id));
    assert_eq!(ctx.remote.write_count(), 0);

    // Reads merge the local document into remote results.
    let fetched = ctx.app.store().fetch(&Query::documents("note")).await;
    assert_eq!(fetched.backend, Backend::Remote);
    assert_eq!(fetched.documents.len(), 1);
    assert_eq!(fetched.documents[0]["body"], "hello");
}

#[tokio::test]
async fn test_authenticated_write_goes_remote_only() {
    let ctx = TestContext::new(Wiring::ReadWrite, true);
    let written = ctx.app.store().create(note("n1", "hello")).await.unwrap();

    assert_eq!(written["_id"], "n1");
    assert_eq!(ctx.remote.documents().len(), 1);
    assert!(ctx.local.is_empty());
}

#[tokio::test]
async fn test_rejected_credential_is_permission_denied() {
    let ctx = TestContext::new(Wiring::ReadWrite, true);
    ctx.remote.set_rejecting_writes(true);

    let err = ctx.app.store().create(note("n1", "hello")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    // No silent local duplication.
    assert!(ctx.local.is_empty());
}

#[tokio::test]
async fn test_duplicate_create_is_classified() {
    let ctx = TestContext::new(Wiring::ReadWrite, false);
    ctx.app.store().create(note("n1", "first")).await.unwrap();

    let err = ctx.app.store().create(note("n1", "second")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);

    let kept = ctx
        .app
        .store()
        .create_if_not_exists(note("n1", "third"))
        .await
        .unwrap();
    assert_eq!(kept["body"], "first");
}

#[tokio::test]
async fn test_local_only_writes_and_patches() {
    let ctx = TestContext::new(Wiring::LocalOnly, false);
    let store = ctx.app.store();

    let created = store.create(note("n1", "hello")).await.unwrap();
    let id = created["_id"].as_str().unwrap().to_owned();
    assert_eq!(id, "local-n1");
    assert!(created.get("_createdAt").is_some());

    let patched = store
        .patch("note", &id, Patch::new().set("body", "edited").unset("missing"))
        .await
        .unwrap();
    assert_eq!(patched["body"], "edited");

    let fetched = store.fetch_one(&Query::by_id("note", &id)).await.unwrap();
    assert_eq!(fetched["body"], "edited");

    store.delete("note", &id).await.unwrap();
    assert!(store.fetch_one(&Query::by_id("note", &id)).await.is_none());
}

#[tokio::test]
async fn test_local_only_write_to_full_store_does_not_fail() {
    let local: Arc<dyn LocalStore> = Arc::new(MemoryStore::with_capacity_bytes(16));
    let store = DataStore::new(None, local, false);

    let written = store.create(note("n1", "a body that will not fit")).await.unwrap();
    assert!(is_local_id(written["_id"].as_str().unwrap()));
}

#[tokio::test]
async fn test_patch_of_missing_local_document_is_not_found() {
    let ctx = TestContext::new(Wiring::LocalOnly, false);
    let err = ctx
        .app
        .store()
        .patch("note", "local-missing", Patch::new().set("body", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_local_patch_shadows_remote_document() {
    let remote = InMemoryRemote::with_documents(vec![note("n1", "remote")]);
    let ctx = TestContext::with_remote(Wiring::ReadOnly, true, remote);

    ctx.app
        .store()
        .patch("note", "n1", Patch::new().set("body", "local edit"))
        .await
        .unwrap();

    let fetched = ctx.app.store().fetch(&Query::documents("note")).await;
    assert_eq!(fetched.documents.len(), 1);
    assert_eq!(fetched.documents[0]["body"], "local edit");
    // The remote copy is untouched.
    assert_eq!(ctx.remote.documents()[0]["body"], "remote");
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_read_degrades_to_local_when_remote_fails() {
    let remote = Arc::new(InMemoryRemote::new());
    let local: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());

    // Seed the local store through a local-only facade sharing the medium.
    DataStore::new(None, Arc::clone(&local), false)
        .create(note("n1", "cached"))
        .await
        .unwrap();

    let store = DataStore::new(
        Some(RemoteBackend::new(Arc::clone(&remote) as Arc<dyn RemoteContent>, None)),
        local,
        false,
    );
    remote.set_failing(true);

    let fetched = store.fetch(&Query::documents("note")).await;
    assert_eq!(fetched.backend, Backend::Local);
    assert_eq!(fetched.documents.len(), 1);
    assert_eq!(fetched.documents[0]["body"], "cached");
}

#[tokio::test]
async fn test_read_never_fails_with_everything_unavailable() {
    let remote = Arc::new(InMemoryRemote::new());
    remote.set_failing(true);
    let store = DataStore::new(
        Some(RemoteBackend::new(remote as Arc<dyn RemoteContent>, None)),
        Arc::new(MemoryStore::unavailable()),
        true,
    );

    let fetched = store.fetch(&Query::documents("note")).await;
    assert!(fetched.documents.is_empty());
    assert!(store.fetch_one(&Query::by_id("note", "n1")).await.is_none());
}

#[tokio::test]
async fn test_empty_remote_result_is_not_a_failure() {
    let ctx = TestContext::new(Wiring::ReadOnly, false);
    ctx.local
        .set("swatchbook.docs.note", &json!([note("local-n1", "stale")]).to_string())
        .unwrap();

    let fetched = ctx.app.store().fetch(&Query::documents("note")).await;
    assert_eq!(fetched.backend, Backend::Remote);
    assert!(fetched.documents.is_empty());
}
