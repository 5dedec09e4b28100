//! Catalog Product

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::cart::NewLineItem;

/// A sellable product as listed by the print provider's shop API
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShopProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

/// Prices are in minor units
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: u64,
    pub title: String,
    pub price: i64,
    #[serde(default)] pub sku: String,
    #[serde(default = "default_enabled")] pub is_enabled: bool,
    #[serde(default)] pub is_default: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub src: String,
    #[serde(default)] pub variant_ids: Vec<u64>,
    #[serde(default)] pub is_default: bool,
}

/// Artwork registered with the print provider's media library
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: String,
    pub file_name: String,
    #[serde(default)] pub height: u32,
    #[serde(default)] pub width: u32,
    #[serde(default)] pub size: u64,
    #[serde(default)] pub mime_type: String,
    #[serde(default)] pub preview_url: String,
    #[serde(default)] pub upload_time: String,
}

fn default_visible() -> bool { true }
fn default_enabled() -> bool { true }

impl ShopProduct {
    pub fn image_for(&self, variant_id: u64) -> Option<&str> {
        self.images.iter().find(|i| i.variant_ids.contains(&variant_id)).map(|i| i.src.as_str())
    }

    /// Drops disabled variants so listings only offer what can be ordered
    pub fn sellable(mut self) -> Self {
        self.variants.retain(|v| v.is_enabled);
        self
    }

    /// Builds the cart selection for one of this product's enabled variants.
    pub fn line_item(&self, variant_id: u64) -> Result<NewLineItem, ProductError> {
        let variant = self.variants.iter().find(|v| v.id == variant_id).ok_or(ProductError::VariantNotFound(variant_id))?;
        if !variant.is_enabled { return Err(ProductError::VariantDisabled(variant_id)); }
        Ok(NewLineItem {
            product_id: self.id.clone(),
            variant_id,
            name: format!("{}, {}", self.title, variant.title),
            unit_price: Decimal::new(variant.price, 2),
            image: self.image_for(variant_id).unwrap_or_default().to_string(),
            blueprint_id: self.blueprint_id,
            print_provider_id: self.print_provider_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { VariantNotFound(u64), VariantDisabled(u64) }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::VariantNotFound(id) => write!(f, "Variant {} not found", id), Self::VariantDisabled(id) => write!(f, "Variant {} is not available", id) }
    }
}
