//! Media descriptors decoded from raw content rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Crop insets as fractions of the source image, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Crop {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Crop {
    /// A crop that removes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [self.top, self.bottom, self.left, self.right]
            .iter()
            .all(|inset| inset.abs() < f64::EPSILON)
    }
}

/// Focal point as fractions of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub x: f64,
    pub y: f64,
}

/// One entry of an extracted colour palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteSwatch {
    pub background: String,
    pub foreground: String,
}

/// Colours extracted from an image by the content service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant: Option<PaletteSwatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrant: Option<PaletteSwatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<PaletteSwatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_muted: Option<PaletteSwatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_muted: Option<PaletteSwatch>,
}

/// An image field: a backing asset plus presentation metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    /// Unresolved asset reference, e.g. `image-abc-800x600-jpg`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_ref: Option<String>,
    /// Id of the dereferenced asset document, same form as `asset_ref`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    /// Direct URL of the original file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotspot: Option<Hotspot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette: Option<Palette>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl ImageAsset {
    /// Decode an image field. Returns `None` when the value carries no
    /// reference and no URL.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let asset = obj.get("asset");

        let image = Self {
            asset_ref: string_at(asset, "_ref"),
            asset_id: string_at(asset, "_id"),
            url: string_at(asset, "url").or_else(|| string_at(Some(value), "url")),
            crop: decode(obj.get("crop")).filter(|crop: &Crop| !crop.is_empty()),
            hotspot: decode(obj.get("hotspot")),
            palette: decode(
                asset
                    .and_then(|a| a.get("metadata"))
                    .and_then(|m| m.get("palette"))
                    .or_else(|| obj.get("palette")),
            ),
            alt: string_at(Some(value), "alt"),
        };

        (image.reference().is_some() || image.url.is_some()).then_some(image)
    }

    /// The backing asset reference, resolved or not.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.asset_ref.as_deref().or(self.asset_id.as_deref())
    }

    /// Whether this image carries anything the CDN can transform.
    #[must_use]
    pub fn is_transformable(&self) -> bool {
        self.reference().is_some() || self.crop.is_some() || self.hotspot.is_some()
    }
}

/// Reference to binary media.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssetDescriptor {
    /// Legacy plain URL, used as-is.
    Url(String),
    Image(ImageAsset),
}

impl AssetDescriptor {
    /// Decode a raw field. Empty strings and unrecognised shapes are `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(url) if !url.trim().is_empty() => Some(Self::Url(url.clone())),
            Value::Object(_) => ImageAsset::from_value(value).map(Self::Image),
            _ => None,
        }
    }

    /// Alt text, if any.
    #[must_use]
    pub fn alt(&self) -> Option<&str> {
        match self {
            Self::Url(_) => None,
            Self::Image(image) => image.alt.as_deref(),
        }
    }

    #[must_use]
    pub const fn palette(&self) -> Option<&Palette> {
        match self {
            Self::Url(_) => None,
            Self::Image(image) => image.palette.as_ref(),
        }
    }
}

/// Media with optional per-device overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsiveImage {
    pub default: Option<AssetDescriptor>,
    pub mobile: Option<AssetDescriptor>,
    pub desktop: Option<AssetDescriptor>,
}

impl ResponsiveImage {
    /// Decode either `{default, mobile, desktop}` or a bare image/URL, which
    /// becomes the default.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let has_variants = value
            .as_object()
            .is_some_and(|obj| ["default", "mobile", "desktop"].iter().any(|k| obj.contains_key(*k)));

        if has_variants {
            let variant = |key: &str| value.get(key).and_then(AssetDescriptor::from_value);
            Self {
                default: variant("default"),
                mobile: variant("mobile"),
                desktop: variant("desktop"),
            }
        } else {
            Self {
                default: AssetDescriptor::from_value(value),
                ..Self::default()
            }
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.default.is_none() && self.mobile.is_none() && self.desktop.is_none()
    }
}

fn string_at(value: Option<&Value>, key: &str) -> Option<String> {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn decode<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| T::deserialize(v).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_is_url() {
        assert_eq!(
            AssetDescriptor::from_value(&json!("https://example.com/a.png")),
            Some(AssetDescriptor::Url("https://example.com/a.png".to_owned()))
        );
        assert_eq!(AssetDescriptor::from_value(&json!("  ")), None);
        assert_eq!(AssetDescriptor::from_value(&json!(42)), None);
    }

    #[test]
    fn test_image_field_decodes_metadata() {
        let value = json!({
            "_type": "image",
            "asset": {
                "_id": "image-abc-800x600-jpg",
                "url": "https://cdn.example.com/abc.jpg",
                "metadata": {"palette": {"dominant": {"background": "#112233", "foreground": "#fff"}}}
            },
            "crop": {"top": 0.1, "bottom": 0.0, "left": 0.0, "right": 0.2},
            "hotspot": {"x": 0.5, "y": 0.4, "width": 1, "height": 1},
            "alt": "Oak"
        });

        let AssetDescriptor::Image(image) = AssetDescriptor::from_value(&value).unwrap() else {
            panic!("expected image");
        };
        assert_eq!(image.reference(), Some("image-abc-800x600-jpg"));
        assert_eq!(image.url.as_deref(), Some("https://cdn.example.com/abc.jpg"));
        assert_eq!(image.crop.unwrap().right, 0.2);
        assert_eq!(image.hotspot.unwrap().x, 0.5);
        assert_eq!(image.palette.unwrap().dominant.unwrap().background, "#112233");
        assert_eq!(image.alt.as_deref(), Some("Oak"));
    }

    #[test]
    fn test_zero_crop_and_bad_pieces_decode_to_none() {
        let value = json!({
            "asset": {"_ref": "image-abc-10x10-png"},
            "crop": {"top": 0, "bottom": 0, "left": 0, "right": 0},
            "hotspot": "middle"
        });
        let image = ImageAsset::from_value(&value).unwrap();
        assert!(image.crop.is_none());
        assert!(image.hotspot.is_none());
        assert!(image.is_transformable());
    }

    #[test]
    fn test_image_without_reference_or_url_is_none() {
        assert!(ImageAsset::from_value(&json!({"alt": "nothing"})).is_none());
    }

    #[test]
    fn test_responsive_variants() {
        let value = json!({
            "default": {"asset": {"_ref": "image-a-10x10-png"}},
            "mobile": "https://example.com/m.png"
        });
        let responsive = ResponsiveImage::from_value(&value);
        assert!(responsive.default.is_some());
        assert!(matches!(responsive.mobile, Some(AssetDescriptor::Url(_))));
        assert!(responsive.desktop.is_none());

        let bare = ResponsiveImage::from_value(&json!("https://example.com/a.png"));
        assert!(bare.default.is_some());
        assert!(bare.mobile.is_none());

        assert!(ResponsiveImage::from_value(&Value::Null).is_empty());
    }
}
