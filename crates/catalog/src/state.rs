//! Process-wide service wiring.

use std::sync::Arc;

use crate::config::SwatchbookConfig;
use crate::content::ContentService;
use crate::media::MediaResolver;
use crate::rate_limit::RateLimiter;
use crate::services::accounts::AccountService;
use crate::store::{DataStore, RemoteError};

/// Services built once at start-up and shared by every caller.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Swatchbook {
    inner: Arc<SwatchbookInner>,
}

struct SwatchbookInner {
    config: SwatchbookConfig,
    store: DataStore,
    content: ContentService,
    login_limiter: RateLimiter,
}

impl Swatchbook {
    /// Build HTTP clients and the file store from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if an HTTP client cannot be constructed.
    pub fn new(config: SwatchbookConfig) -> Result<Self, RemoteError> {
        let store = DataStore::from_config(&config)?;
        Ok(Self::with_store(config, store))
    }

    /// Wire services around an existing store.
    #[must_use]
    pub fn with_store(config: SwatchbookConfig, store: DataStore) -> Self {
        let content = ContentService::new(store.clone(), MediaResolver::from_config(&config));
        let login_limiter = RateLimiter::new(store.local_store(), config.login_limit);

        Self {
            inner: Arc::new(SwatchbookInner {
                config,
                store,
                content,
                login_limiter,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SwatchbookConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &DataStore {
        &self.inner.store
    }

    #[must_use]
    pub fn content(&self) -> &ContentService {
        &self.inner.content
    }

    #[must_use]
    pub fn media(&self) -> &MediaResolver {
        self.inner.content.resolver()
    }

    /// Account operations over the shared store and login limiter.
    #[must_use]
    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(&self.inner.store, &self.inner.login_limiter)
    }
}
