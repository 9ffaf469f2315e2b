//! Catalog read commands.

use serde_json::{Value, json};

use swatchbook::Swatchbook;
use swatchbook::media::{DeviceVariant, ImageFormat, ResponsiveImage, TransformOptions};

use super::{emit, emit_value};

/// List all products.
pub async fn products(app: &Swatchbook) -> Result<(), Box<dyn std::error::Error>> {
    let products = app.content().products().await;
    tracing::info!(count = products.len(), "products loaded");
    emit(&products)
}

/// Show one product by slug.
pub async fn product(app: &Swatchbook, slug: &str) -> Result<(), Box<dyn std::error::Error>> {
    let product = app
        .content()
        .product_by_slug(slug)
        .await
        .ok_or_else(|| format!("No product with slug '{slug}'"))?;
    emit(&product)
}

/// List material groups.
pub async fn materials(app: &Swatchbook) -> Result<(), Box<dyn std::error::Error>> {
    let groups = app.content().material_groups().await;
    tracing::info!(count = groups.len(), "material groups loaded");
    emit(&groups)
}

/// Show site settings.
pub async fn settings(app: &Swatchbook) -> Result<(), Box<dyn std::error::Error>> {
    match app.content().site_settings().await {
        Some(settings) => emit(&settings),
        None => emit_value(&Value::Null),
    }
}

/// Resolve a raw image field. Input that is not valid JSON is treated as a URL.
pub fn resolve_image(
    app: &Swatchbook,
    input: &str,
    width: u32,
    quality: u8,
    format: ImageFormat,
    variant: Option<DeviceVariant>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !(1..=100).contains(&quality) {
        return Err(format!("Quality must be between 1 and 100, got {quality}").into());
    }

    let value = serde_json::from_str::<Value>(input).unwrap_or_else(|_| Value::String(input.to_owned()));
    let image = ResponsiveImage::from_value(&value);
    if image.is_empty() {
        tracing::warn!("input did not contain an image");
    }

    let resolver = app.media().clone().with_options(TransformOptions {
        width,
        quality,
        format,
    });
    let resolved = resolver.resolve_responsive(&image);

    match variant {
        Some(variant) => emit_value(&json!({ "url": resolved.for_variant(variant) })),
        None => emit(&resolved),
    }
}
