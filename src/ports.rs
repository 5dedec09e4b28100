//! Side-effecting collaborators of the cart and shipping services

use async_trait::async_trait;

use crate::domain::aggregates::{ShippingInfo, ShopProduct, UploadedImage};
use crate::Result;

/// String key-value persistence, standing in for the shopper's local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: String) -> Result<()>;
}

/// Shipping-rate lookup for one (blueprint, print provider) pair.
#[async_trait]
pub trait RateLookup: Send + Sync + 'static {
    async fn shipping_info(&self, blueprint_id: u64, print_provider_id: u64) -> Result<ShippingInfo>;
}

#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    async fn shop_products(&self) -> Result<Vec<ShopProduct>>;
}

/// Hands artwork at a public URL to the print provider's media library.
#[async_trait]
pub trait ImageUploads: Send + Sync + 'static {
    async fn upload_image(&self, file_name: &str, url: &str) -> Result<UploadedImage>;
}
