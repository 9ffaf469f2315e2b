//! Media resolution.
//!
//! Turns asset descriptors into displayable URLs. Resolution never fails:
//! absent media yields an empty string and transform failures fall back to
//! the descriptor's raw URL.

mod asset;
mod url;

pub use asset::{AssetDescriptor, Crop, Hotspot, ImageAsset, Palette, PaletteSwatch, ResponsiveImage};
pub use url::{AssetRef, ImageFormat, ImageUrlBuilder, TransformError, TransformOptions};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::SwatchbookConfig;

/// Target device class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceVariant {
    #[default]
    Default,
    Mobile,
    Desktop,
}

/// Resolved URLs for one piece of responsive media.
///
/// `mobile` and `desktop` are only present when they differ from `default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedMedia {
    pub default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desktop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette: Option<Palette>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl ResolvedMedia {
    /// URL for a device, falling back to the default.
    #[must_use]
    pub fn for_variant(&self, variant: DeviceVariant) -> &str {
        let chosen = match variant {
            DeviceVariant::Default => None,
            DeviceVariant::Mobile => self.mobile.as_deref(),
            DeviceVariant::Desktop => self.desktop.as_deref(),
        };
        chosen.unwrap_or(&self.default)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.default.is_empty() && self.mobile.is_none() && self.desktop.is_none()
    }
}

/// Resolves descriptors against the image CDN.
#[derive(Debug, Clone, Default)]
pub struct MediaResolver {
    urls: Option<ImageUrlBuilder>,
    options: TransformOptions,
}

impl MediaResolver {
    /// `None` disables transforms; every image resolves to its raw URL.
    #[must_use]
    pub fn new(urls: Option<ImageUrlBuilder>) -> Self {
        Self {
            urls,
            options: TransformOptions::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SwatchbookConfig) -> Self {
        Self::new(config.remote.as_ref().map(ImageUrlBuilder::from_config))
    }

    /// Replace the default transform options.
    #[must_use]
    pub const fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve with the default transform options.
    #[must_use]
    pub fn resolve(&self, descriptor: Option<&AssetDescriptor>) -> String {
        self.resolve_with(descriptor, &self.options)
    }

    /// Resolve with explicit transform options.
    #[must_use]
    pub fn resolve_with(&self, descriptor: Option<&AssetDescriptor>, options: &TransformOptions) -> String {
        let image = match descriptor {
            None => return String::new(),
            Some(AssetDescriptor::Url(url)) => return url.clone(),
            Some(AssetDescriptor::Image(image)) => image,
        };

        let raw = || image.url.clone().unwrap_or_default();
        if !image.is_transformable() {
            return raw();
        }

        let Some(urls) = &self.urls else {
            debug!(reference = image.reference(), "no media project configured, using raw url");
            return raw();
        };

        urls.build(image, options).unwrap_or_else(|e| {
            debug!(error = %e, "image transform failed, using raw url");
            raw()
        })
    }

    /// Decode and resolve a raw field.
    #[must_use]
    pub fn resolve_value(&self, value: &Value) -> String {
        self.resolve(AssetDescriptor::from_value(value).as_ref())
    }

    /// Resolve every variant of responsive media.
    #[must_use]
    pub fn resolve_responsive(&self, image: &ResponsiveImage) -> ResolvedMedia {
        let default = self.resolve(image.default.as_ref());
        let distinct = |variant: Option<&AssetDescriptor>| {
            let url = self.resolve(variant);
            (!url.is_empty() && url != default).then_some(url)
        };
        let mobile = distinct(image.mobile.as_ref());
        let desktop = distinct(image.desktop.as_ref());

        let primary = image
            .default
            .as_ref()
            .or(image.desktop.as_ref())
            .or(image.mobile.as_ref());

        ResolvedMedia {
            palette: primary.and_then(AssetDescriptor::palette).cloned(),
            alt: primary.and_then(AssetDescriptor::alt).map(str::to_owned),
            default,
            mobile,
            desktop,
        }
    }

    /// Resolve the URL for one device.
    #[must_use]
    pub fn resolve_variant(&self, image: &ResponsiveImage, variant: DeviceVariant) -> String {
        self.resolve_responsive(image).for_variant(variant).to_owned()
    }
}
