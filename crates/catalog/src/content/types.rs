//! Domain records decoded from raw content rows.
//!
//! Each record type has exactly one decode boundary. Missing optional fields
//! are tolerated there; missing required fields produce a [`DecodeError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swatchbook_core::ProductId;
use thiserror::Error;

use crate::materials::{MaterialSelection, ReconciledMaterials, reconcile};
use crate::media::{MediaResolver, ResolvedMedia, ResponsiveImage};

/// A raw row could not become a domain record.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The row does not have the expected structure.
    #[error("invalid document shape: {0}")]
    Shape(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct Slug {
    current: String,
}

// =============================================================================
// Product
// =============================================================================

#[derive(Debug, Deserialize)]
struct ProductRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    slug: Option<Slug>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    hero: Value,
    #[serde(default)]
    gallery: Vec<Value>,
    #[serde(default)]
    materials: Vec<Value>,
}

/// A catalog product with media resolved and materials reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub hero: ResolvedMedia,
    pub gallery: Vec<ResolvedMedia>,
    pub materials: ReconciledMaterials,
    /// Stored only in the local fallback store.
    pub is_local: bool,
}

impl Product {
    /// Decode a product row.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the row has no `_id`, title or slug.
    pub fn decode(row: Value, resolver: &MediaResolver) -> Result<Self, DecodeError> {
        let record: ProductRecord = serde_json::from_value(row)?;

        let title = record
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(DecodeError::MissingField("title"))?;
        let slug = record
            .slug
            .map(|s| s.current)
            .filter(|s| !s.is_empty())
            .ok_or(DecodeError::MissingField("slug"))?;

        let gallery = record
            .gallery
            .iter()
            .map(|image| resolver.resolve_responsive(&ResponsiveImage::from_value(image)))
            .filter(|media| !media.is_empty())
            .collect();

        let selections: Vec<MaterialSelection> = record
            .materials
            .iter()
            .map(MaterialSelection::from_value)
            .collect();

        let id = ProductId::new(record.id);
        Ok(Self {
            is_local: id.is_local(),
            id,
            slug,
            title,
            summary: record.summary,
            hero: resolver.resolve_responsive(&ResponsiveImage::from_value(&record.hero)),
            gallery,
            materials: reconcile(&selections),
        })
    }
}

// =============================================================================
// SiteSettings
// =============================================================================

#[derive(Debug, Deserialize)]
struct SiteSettingsRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    logo: Value,
}

/// Site-wide presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSettings {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub logo: ResolvedMedia,
}

impl SiteSettings {
    /// Decode the settings singleton.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the row has no title.
    pub fn decode(row: Value, resolver: &MediaResolver) -> Result<Self, DecodeError> {
        let record: SiteSettingsRecord = serde_json::from_value(row)?;
        Ok(Self {
            title: record
                .title
                .filter(|t| !t.trim().is_empty())
                .ok_or(DecodeError::MissingField("title"))?,
            description: record.description,
            logo: resolver.resolve_responsive(&ResponsiveImage::from_value(&record.logo)),
        })
    }
}
