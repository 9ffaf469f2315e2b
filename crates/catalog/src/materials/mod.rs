//! Material swatches, groups and selections.
//!
//! A swatch is identified by its backing asset, never by its display name:
//! two swatches with the same asset are the same material even if their
//! names differ, and two swatches with the same name but different assets
//! are distinct.

mod reconcile;

pub use reconcile::{ReconciledMaterials, ReconciledSelection, flatten, group, reconcile};

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::Value;
use swatchbook_core::MaterialGroupId;
use tracing::debug;

use crate::media::AssetDescriptor;

/// Locale used when the requested one is missing.
pub const DEFAULT_LOCALE: &str = "en";

// =============================================================================
// IdentityKey
// =============================================================================

/// Stable identity of a swatch, derived from its backing asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Derive from a raw image field: the asset `_ref`, else the
    /// dereferenced asset `_id`, else the asset URL.
    #[must_use]
    pub fn from_image(image: &Value) -> Option<Self> {
        let candidate = match image {
            Value::String(url) => Some(url.as_str()),
            Value::Object(_) => {
                fn field<'v>(v: Option<&'v Value>, key: &str) -> Option<&'v str> {
                    v.and_then(|v| v.get(key)).and_then(Value::as_str)
                }

                let asset = image.get("asset");
                field(asset, "_ref")
                    .or_else(|| field(asset, "_id"))
                    .or_else(|| field(asset, "url"))
                    .or_else(|| field(Some(image), "url"))
            }
            _ => None,
        };

        candidate
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| Self(key.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// =============================================================================
// LocalizedText
// =============================================================================

/// Text keyed by locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    /// A single value in the default locale.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self(BTreeMap::from([(DEFAULT_LOCALE.to_owned(), text.into())]))
    }

    /// Decode a plain string or a locale → string map.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::plain(text.clone()),
            Value::Object(map) => Self(
                map.iter()
                    .filter(|(locale, _)| !locale.starts_with('_'))
                    .filter_map(|(locale, text)| {
                        text.as_str().map(|t| (locale.clone(), t.to_owned()))
                    })
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    /// Text for `locale`, else the default locale, else any value.
    #[must_use]
    pub fn get(&self, locale: &str) -> Option<&str> {
        self.0
            .get(locale)
            .or_else(|| self.0.get(DEFAULT_LOCALE))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// MaterialSwatch
// =============================================================================

/// One material sample.
///
/// Equality and hashing consider only the identity key.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialSwatch {
    pub key: IdentityKey,
    pub name: LocalizedText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<AssetDescriptor>,
}

impl MaterialSwatch {
    /// Decode `{name, image}`. Swatches without an identifiable asset are
    /// dropped.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let image = value.get("image").unwrap_or(&Value::Null);
        let Some(key) = IdentityKey::from_image(image) else {
            let item = value.get("_key").and_then(serde_json::Value::as_str);
            debug!(item, "dropping swatch without an identifiable asset");
            return None;
        };

        Some(Self {
            key,
            name: value.get("name").map(LocalizedText::from_value).unwrap_or_default(),
            image: AssetDescriptor::from_value(image),
        })
    }

    /// Display name in `locale` with fallbacks; empty if unnamed.
    #[must_use]
    pub fn name(&self, locale: &str) -> &str {
        self.name.get(locale).unwrap_or_default()
    }
}

impl PartialEq for MaterialSwatch {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for MaterialSwatch {}

impl Hash for MaterialSwatch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

fn swatches(value: Option<&Value>) -> Vec<MaterialSwatch> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(MaterialSwatch::from_value).collect())
        .unwrap_or_default()
}

// =============================================================================
// MaterialBook / MaterialGroup
// =============================================================================

/// An ordered set of swatches inside a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialBook {
    pub title: LocalizedText,
    pub swatches: Vec<MaterialSwatch>,
}

impl MaterialBook {
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            title: value.get("title").map(LocalizedText::from_value).unwrap_or_default(),
            swatches: swatches(value.get("items")),
        }
    }
}

/// Canonical material hierarchy, authored in the content service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialGroup {
    pub id: MaterialGroupId,
    pub title: LocalizedText,
    pub books: Vec<MaterialBook>,
}

impl MaterialGroup {
    /// Decode a dereferenced group document. Requires an `_id`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("_id").and_then(Value::as_str)?;
        Some(Self {
            id: MaterialGroupId::new(id),
            title: value.get("title").map(LocalizedText::from_value).unwrap_or_default(),
            books: value
                .get("books")
                .and_then(Value::as_array)
                .map(|books| books.iter().map(MaterialBook::from_value).collect())
                .unwrap_or_default(),
        })
    }

    /// Every swatch across all books, in book order.
    pub fn swatches(&self) -> impl Iterator<Item = &MaterialSwatch> {
        self.books.iter().flat_map(|book| book.swatches.iter())
    }
}

// =============================================================================
// MaterialSelection
// =============================================================================

/// A product's point-in-time pick of swatches from one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialSelection {
    /// Referenced group id, if known.
    pub group_ref: Option<String>,
    /// The live group, when the reference dereferenced.
    pub group: Option<MaterialGroup>,
    /// Swatches as captured at selection time.
    pub captured: Vec<MaterialSwatch>,
}

impl MaterialSelection {
    /// Decode `{group, items}` where `group` is either a dereferenced group
    /// document or a bare `{_ref}`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let raw_group = value.get("group");
        let group = raw_group.and_then(MaterialGroup::from_value);
        let group_ref = group.as_ref().map(|g| g.id.as_str().to_owned()).or_else(|| {
            raw_group
                .and_then(|g| g.get("_ref"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        });

        if group.is_none() && group_ref.is_some() {
            debug!(group_ref = ?group_ref, "material group did not dereference");
        }

        Self {
            group_ref,
            group,
            captured: swatches(value.get("items")),
        }
    }
}
