//! Integration tests for Swatchbook.
//!
//! Every test runs against an [`InMemoryRemote`] and a [`MemoryStore`], so
//! no network or content service project is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p swatchbook-integration-tests
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use swatchbook::Swatchbook;
use swatchbook::config::{RemoteConfig, SwatchbookConfig};
use swatchbook::rate_limit::RateLimitConfig;
use swatchbook::store::testing::InMemoryRemote;
use swatchbook::store::{DataStore, LocalStore, MemoryStore, RemoteBackend, RemoteContent};

/// Project id used for CDN URLs in fixtures.
pub const PROJECT: &str = "abc123";
/// Dataset used for CDN URLs in fixtures.
pub const DATASET: &str = "production";

/// How the remote side of a fixture is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    /// No remote service at all.
    LocalOnly,
    /// Remote reads, no write credential.
    ReadOnly,
    /// Remote reads and authenticated writes.
    ReadWrite,
}

/// A wired application plus handles on its doubles.
pub struct TestContext {
    pub app: Swatchbook,
    pub remote: Arc<InMemoryRemote>,
    pub local: Arc<MemoryStore>,
}

impl TestContext {
    /// Build a context with default login limits.
    #[must_use]
    pub fn new(wiring: Wiring, allow_local_writes: bool) -> Self {
        Self::with_remote(wiring, allow_local_writes, InMemoryRemote::new())
    }

    /// Build a context around a pre-seeded remote.
    #[must_use]
    pub fn with_remote(wiring: Wiring, allow_local_writes: bool, remote: InMemoryRemote) -> Self {
        Self::build(wiring, allow_local_writes, remote, RateLimitConfig::default())
    }

    /// Build a context with custom login limits.
    #[must_use]
    pub fn with_limits(wiring: Wiring, limits: RateLimitConfig) -> Self {
        Self::build(wiring, false, InMemoryRemote::new(), limits)
    }

    fn build(
        wiring: Wiring,
        allow_local_writes: bool,
        remote: InMemoryRemote,
        login_limit: RateLimitConfig,
    ) -> Self {
        let remote = Arc::new(remote);
        let local = Arc::new(MemoryStore::new());

        let backend = match wiring {
            Wiring::LocalOnly => None,
            Wiring::ReadOnly => Some(RemoteBackend::new(
                Arc::clone(&remote) as Arc<dyn RemoteContent>,
                None,
            )),
            Wiring::ReadWrite => Some(RemoteBackend::new(
                Arc::clone(&remote) as Arc<dyn RemoteContent>,
                Some(Arc::clone(&remote) as Arc<dyn RemoteContent>),
            )),
        };

        let store = DataStore::new(
            backend,
            Arc::clone(&local) as Arc<dyn LocalStore>,
            allow_local_writes,
        );
        let config = SwatchbookConfig {
            remote: (wiring != Wiring::LocalOnly).then(|| RemoteConfig::new(PROJECT, DATASET)),
            allow_local_writes,
            local_store_dir: PathBuf::from("unused"),
            login_limit,
        };

        Self {
            app: Swatchbook::with_store(config, store),
            remote,
            local,
        }
    }
}

/// Hex SHA-256 digest, the format of pre-migration password hashes.
#[must_use]
pub fn legacy_digest(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// An image field referencing `asset_ref`.
#[must_use]
pub fn image(asset_ref: &str) -> Value {
    json!({ "_type": "image", "asset": { "_ref": asset_ref } })
}

/// A swatch item backed by `asset_ref`.
#[must_use]
pub fn swatch(asset_ref: &str, name: &str) -> Value {
    json!({ "name": name, "image": image(asset_ref) })
}

/// A material group document with one book per entry of `books`.
#[must_use]
pub fn group_doc(id: &str, books: Vec<Vec<Value>>) -> Value {
    let books: Vec<Value> = books
        .into_iter()
        .enumerate()
        .map(|(i, items)| json!({ "title": format!("Book {}", i + 1), "items": items }))
        .collect();
    json!({ "_id": id, "_type": "materialGroup", "title": id, "books": books })
}

/// A product document with the groups already dereferenced.
#[must_use]
pub fn product_doc(id: &str, slug: &str, hero: Value, materials: Vec<(Value, Vec<Value>)>) -> Value {
    let materials: Vec<Value> = materials
        .into_iter()
        .map(|(group, items)| json!({ "group": group, "items": items }))
        .collect();
    json!({
        "_id": id,
        "_type": "product",
        "title": slug.replace('-', " "),
        "slug": { "current": slug },
        "hero": hero,
        "materials": materials,
    })
}
