//! Print-on-demand storefront core
//!
//! Cart state and shipping estimation for a print-on-demand shop.
//!
//! ## Features
//! - Per-session carts persisted to a pluggable key-value store
//! - Shipping estimates grouped by print provider, with a rate cache
//! - Catalog listing from the print provider's shop API
//! - Checkout payloads for a hosted payment page

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error(transparent)]
    Product(#[from] domain::aggregates::ProductError),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid session id: {0}")]
    InvalidSession(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StorefrontError {
    fn from(err: sqlx::Error) -> Self { Self::Storage(err.to_string()) }
}

impl From<reqwest::Error> for StorefrontError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() { Self::MalformedResponse(err.to_string()) } else { Self::Upstream(err.to_string()) }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
