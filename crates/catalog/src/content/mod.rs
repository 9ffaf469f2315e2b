//! Content queries.
//!
//! Issues typed queries through the [`DataStore`] and shapes raw rows into
//! domain records. Rows that fail to decode are skipped with a warning.
//! Results served by the remote service are cached for 5 minutes; results
//! from the local fallback store are never cached.

mod cache;
mod types;

pub use types::{DecodeError, Product, SiteSettings};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::materials::MaterialGroup;
use crate::media::MediaResolver;
use crate::store::{Backend, DataStore, Fetched, Query};

use cache::{CacheKey, CacheValue};

/// Product projection: dereference each selection's material group.
const PRODUCT_PROJECTION: &str = "{..., materials[]{..., group->}}";

/// Read-only access to catalog content.
#[derive(Clone)]
pub struct ContentService {
    inner: Arc<ContentServiceInner>,
}

struct ContentServiceInner {
    store: DataStore,
    resolver: MediaResolver,
    cache: Cache<CacheKey, CacheValue>,
}

impl ContentService {
    #[must_use]
    pub fn new(store: DataStore, resolver: MediaResolver) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(ContentServiceInner {
                store,
                resolver,
                cache,
            }),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &MediaResolver {
        &self.inner.resolver
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// All products, ordered by title.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Vec<Product> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&CacheKey::Products).await {
            debug!("Cache hit for products");
            return products;
        }

        let query = Query::documents("product")
            .order_by("title", false)
            .project(PRODUCT_PROJECTION);
        let Fetched { documents, backend } = self.inner.store.fetch(&query).await;
        let (documents, groups_backend) = self.join_material_groups(documents).await;
        let products = self.decode_all(documents, "product", Product::decode);

        if backend == Backend::Remote && groups_backend != Some(Backend::Local) {
            self.inner
                .cache
                .insert(CacheKey::Products, CacheValue::Products(products.clone()))
                .await;
        }
        products
    }

    /// The product with the given slug, if any.
    #[instrument(skip(self))]
    pub async fn product_by_slug(&self, slug: &str) -> Option<Product> {
        let cache_key = CacheKey::Product(slug.to_owned());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Some(*product);
        }

        let query = Query::documents("product")
            .filter_eq("slug.current", slug)
            .project(PRODUCT_PROJECTION)
            .limit(1);
        let Fetched { documents, backend } = self.inner.store.fetch(&query).await;
        let (documents, groups_backend) = self.join_material_groups(documents).await;
        let product = self
            .decode_all(documents, "product", Product::decode)
            .into_iter()
            .next()?;

        if backend == Backend::Remote && groups_backend != Some(Backend::Local) {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }
        Some(product)
    }

    // =========================================================================
    // Materials
    // =========================================================================

    /// Every material group.
    #[instrument(skip(self))]
    pub async fn material_groups(&self) -> Vec<MaterialGroup> {
        if let Some(CacheValue::MaterialGroups(groups)) =
            self.inner.cache.get(&CacheKey::MaterialGroups).await
        {
            debug!("Cache hit for material groups");
            return groups;
        }

        let query = Query::documents("materialGroup").order_by("_createdAt", false);
        let Fetched { documents, backend } = self.inner.store.fetch(&query).await;
        let groups: Vec<MaterialGroup> = documents
            .iter()
            .filter_map(|row| {
                let group = MaterialGroup::from_value(row);
                if group.is_none() {
                    warn!("skipping material group without an id");
                }
                group
            })
            .collect();

        if backend == Backend::Remote {
            self.inner
                .cache
                .insert(CacheKey::MaterialGroups, CacheValue::MaterialGroups(groups.clone()))
                .await;
        }
        groups
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// The site settings singleton, if present.
    #[instrument(skip(self))]
    pub async fn site_settings(&self) -> Option<SiteSettings> {
        if let Some(CacheValue::SiteSettings(settings)) =
            self.inner.cache.get(&CacheKey::SiteSettings).await
        {
            return Some(*settings);
        }

        let query = Query::documents("siteSettings").limit(1);
        let Fetched { documents, backend } = self.inner.store.fetch(&query).await;
        let settings = self
            .decode_all(documents, "siteSettings", SiteSettings::decode)
            .into_iter()
            .next()?;

        if backend == Backend::Remote {
            self.inner
                .cache
                .insert(CacheKey::SiteSettings, CacheValue::SiteSettings(Box::new(settings.clone())))
                .await;
        }
        Some(settings)
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    /// Invalidate a cached product.
    pub async fn invalidate_product(&self, slug: &str) {
        self.inner
            .cache
            .invalidate(&CacheKey::Product(slug.to_owned()))
            .await;
        self.inner.cache.invalidate(&CacheKey::Products).await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }

    /// Replace every selection `group` that is still a bare `{_ref}` with the
    /// live group document. Local evaluation ignores the `group->` projection,
    /// so rows from the fallback store always arrive this way.
    ///
    /// Returns the backend that served the groups, if a lookup was needed.
    async fn join_material_groups(&self, mut rows: Vec<Value>) -> (Vec<Value>, Option<Backend>) {
        let wanted: HashSet<String> = rows
            .iter()
            .flat_map(unresolved_group_refs)
            .map(str::to_owned)
            .collect();
        if wanted.is_empty() {
            return (rows, None);
        }

        let Fetched { documents, backend } = self
            .inner
            .store
            .fetch(&Query::documents("materialGroup"))
            .await;
        let groups: HashMap<&str, &Value> = documents
            .iter()
            .filter_map(|doc| Some((doc.get("_id")?.as_str()?, doc)))
            .filter(|(id, _)| wanted.contains(*id))
            .collect();
        debug!(wanted = wanted.len(), found = groups.len(), "joined material groups");

        for selection in rows
            .iter_mut()
            .filter_map(|row| row.get_mut("materials").and_then(Value::as_array_mut))
            .flatten()
        {
            let Some(group) = selection.get_mut("group") else {
                continue;
            };
            let joined = bare_group_ref(group)
                .and_then(|id| groups.get(id))
                .map(|doc| (*doc).clone());
            if let Some(doc) = joined {
                *group = doc;
            }
        }

        (rows, Some(backend))
    }

    fn decode_all<T>(
        &self,
        rows: Vec<Value>,
        doc_type: &str,
        decode: impl Fn(Value, &MediaResolver) -> Result<T, DecodeError>,
    ) -> Vec<T> {
        rows.into_iter()
            .filter_map(|row| {
                let id = row.get("_id").and_then(Value::as_str).map(str::to_owned);
                decode(row, &self.inner.resolver)
                    .map_err(|e| warn!(error = %e, doc_type, id = ?id, "skipping undecodable row"))
                    .ok()
            })
            .collect()
    }
}

/// The referenced id of a group that has not been dereferenced.
fn bare_group_ref(group: &Value) -> Option<&str> {
    if group.get("_id").is_some() {
        return None;
    }
    group.get("_ref").and_then(Value::as_str)
}

fn unresolved_group_refs(row: &Value) -> impl Iterator<Item = &str> {
    row.get("materials")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|selection| selection.get("group").and_then(bare_group_ref))
}
