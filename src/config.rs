//! Service configuration loaded from environment variables.
//!
//! - `PORT` - listen port (default 8083)
//! - `DATABASE_URL` - Postgres key-value store; in-memory storage when unset
//! - `NATS_URL` - publish cart and shipping events when set
//! - `PRINTIFY_API_TOKEN` - bearer token for the print provider API (required)
//! - `PRINTIFY_SHOP_ID` - shop whose products are listed (required)
//! - `PRINTIFY_BASE_URL` - default `https://api.printify.com`
//! - `CART_MAX_QUANTITY` - per-line quantity cap (default 10)
//! - `CART_SESSION_CAPACITY` - carts kept loaded in memory (default 10000)
//! - `RATE_CACHE_TTL_HOURS` - shipping-rate cache lifetime (default 24)
//! - `TAX_RATE` - decimal fraction applied to the item total (default 0)
//! - `CHECKOUT_CURRENCY` - default `USD`
//! - `APP_URL` - public base URL for checkout success/cancel redirects

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::aggregates::DEFAULT_MAX_QUANTITY;
use crate::{Result, StorefrontError};

pub const DEFAULT_PRINTIFY_BASE_URL: &str = "https://api.printify.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub printify: PrintifyConfig,
    pub cart: CartSettings,
    pub rate_cache_ttl_hours: i64,
    pub checkout: CheckoutSettings,
}

#[derive(Debug, Clone)]
pub struct PrintifyConfig { pub base_url: String, pub api_token: String, pub shop_id: String }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSettings { pub max_quantity: u32, pub currency: String, pub max_sessions: usize }

pub const DEFAULT_SESSION_CAPACITY: usize = 10_000;

impl Default for CartSettings {
    fn default() -> Self { Self { max_quantity: DEFAULT_MAX_QUANTITY, currency: "USD".into(), max_sessions: DEFAULT_SESSION_CAPACITY } }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSettings { pub currency: String, pub tax_rate: Decimal, pub success_url: String, pub cancel_url: String }

impl CheckoutSettings {
    pub fn for_app_url(app_url: &str, currency: &str, tax_rate: Decimal) -> Self {
        let base = app_url.trim_end_matches('/');
        Self {
            currency: currency.to_lowercase(),
            tax_rate,
            success_url: format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", base),
            cancel_url: format!("{}/canceled", base),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> { Self::from_lookup(|key| std::env::var(key).ok()) }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| StorefrontError::Config(format!("missing {}", key)));

        let currency = var("CHECKOUT_CURRENCY").unwrap_or_else(|| "USD".into()).to_uppercase();
        let tax_rate: Decimal = parse_or(var("TAX_RATE"), "TAX_RATE", Decimal::ZERO)?;
        if tax_rate.is_sign_negative() { return Err(StorefrontError::Config("TAX_RATE must not be negative".into())); }
        let app_url = var("APP_URL").unwrap_or_else(|| "http://localhost:8083".into());

        Ok(Self {
            port: parse_or(var("PORT"), "PORT", 8083)?,
            database_url: var("DATABASE_URL"),
            nats_url: var("NATS_URL"),
            printify: PrintifyConfig {
                base_url: var("PRINTIFY_BASE_URL").unwrap_or_else(|| DEFAULT_PRINTIFY_BASE_URL.into()),
                api_token: required("PRINTIFY_API_TOKEN")?,
                shop_id: required("PRINTIFY_SHOP_ID")?,
            },
            cart: CartSettings {
                max_quantity: parse_or(var("CART_MAX_QUANTITY"), "CART_MAX_QUANTITY", DEFAULT_MAX_QUANTITY)?.max(1),
                currency: currency.clone(),
                max_sessions: parse_or(var("CART_SESSION_CAPACITY"), "CART_SESSION_CAPACITY", DEFAULT_SESSION_CAPACITY)?.max(1),
            },
            rate_cache_ttl_hours: parse_or(var("RATE_CACHE_TTL_HOURS"), "RATE_CACHE_TTL_HOURS", 24)?,
            checkout: CheckoutSettings::for_app_url(&app_url, &currency, tax_rate),
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| StorefrontError::Config(format!("invalid {}: {}", key, v))),
    }
}
