//! Image CDN URL building.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::asset::{Crop, Hotspot, ImageAsset};
use crate::config::RemoteConfig;

/// `image-<assetId>-<W>x<H>-<ext>`
static IMAGE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^image-([A-Za-z0-9]+)-(\d+)x(\d+)-([A-Za-z0-9]+)$").expect("Invalid regex")
});

/// Why a derived URL could not be built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("image has no asset reference")]
    MissingReference,

    #[error("unrecognised asset reference: {0}")]
    InvalidReference(String),
}

/// Output encoding requested from the CDN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageFormat {
    #[default]
    Webp,
    Jpg,
    Png,
}

impl ImageFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested output size and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    pub width: u32,
    pub quality: u8,
    pub format: ImageFormat,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            width: 1600,
            quality: 85,
            format: ImageFormat::Webp,
        }
    }
}

/// A parsed asset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub extension: String,
}

impl AssetRef {
    /// Parse `image-<id>-<W>x<H>-<ext>`.
    ///
    /// # Errors
    ///
    /// Returns `TransformError::InvalidReference` if the reference does not
    /// have that shape.
    pub fn parse(reference: &str) -> Result<Self, TransformError> {
        let invalid = || TransformError::InvalidReference(reference.to_owned());
        let caps = IMAGE_REF_RE.captures(reference).ok_or_else(invalid)?;

        Ok(Self {
            id: caps[1].to_owned(),
            width: caps[2].parse().map_err(|_| invalid())?,
            height: caps[3].parse().map_err(|_| invalid())?,
            extension: caps[4].to_owned(),
        })
    }

    /// Source-pixel rectangle `left,top,width,height` for a crop.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn rect(&self, crop: &Crop) -> String {
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        let px = |v: f64| v.clamp(0.0, f64::from(u32::MAX)).round() as u32;

        format!(
            "{},{},{},{}",
            px(crop.left * w),
            px(crop.top * h),
            px((1.0 - crop.left - crop.right) * w),
            px((1.0 - crop.top - crop.bottom) * h),
        )
    }
}

/// Builds derived image URLs for one project and dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrlBuilder {
    cdn_host: String,
    project_id: String,
    dataset: String,
}

impl ImageUrlBuilder {
    #[must_use]
    pub fn new(
        cdn_host: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            cdn_host: cdn_host.into(),
            project_id: project_id.into(),
            dataset: dataset.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(&config.cdn_host, &config.project_id, &config.dataset)
    }

    /// Build the derived URL for an image.
    ///
    /// # Errors
    ///
    /// Returns `TransformError` if the image has no parseable reference.
    pub fn build(&self, image: &ImageAsset, options: &TransformOptions) -> Result<String, TransformError> {
        let reference = image.reference().ok_or(TransformError::MissingReference)?;
        let asset = AssetRef::parse(reference)?;

        let mut params = Vec::new();
        if let Some(crop) = image.crop.filter(|c| !c.is_empty()) {
            params.push(format!("rect={}", asset.rect(&crop)));
        }
        if let Some(Hotspot { x, y }) = image.hotspot {
            params.push("crop=focalpoint".to_owned());
            params.push(format!("fp-x={}", x.clamp(0.0, 1.0)));
            params.push(format!("fp-y={}", y.clamp(0.0, 1.0)));
        }
        params.push(format!("w={}", options.width));
        params.push(format!("q={}", options.quality));
        params.push(format!("fm={}", options.format));

        Ok(format!(
            "https://{}/images/{}/{}/{}-{}x{}.{}?{}",
            self.cdn_host,
            self.project_id,
            self.dataset,
            asset.id,
            asset.width,
            asset.height,
            asset.extension,
            params.join("&")
        ))
    }
}
