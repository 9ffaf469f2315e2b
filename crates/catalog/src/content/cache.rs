//! Cache types for content reads.

use crate::materials::MaterialGroup;

use super::types::{Product, SiteSettings};

/// Cache key per read operation.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products,
    Product(String),
    MaterialGroups,
    SiteSettings,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
    MaterialGroups(Vec<MaterialGroup>),
    SiteSettings(Box<SiteSettings>),
}
