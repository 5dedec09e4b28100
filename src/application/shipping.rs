//! Shipping estimation over a cart snapshot

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::aggregates::{HandlingTime, LineItem, OmissionReason, ShippingEstimate, ShippingLedger, ShippingRate};
use crate::domain::value_objects::CountryCode;
use crate::ports::{KeyValueStore, RateLookup};

/// Bump when the cached entry layout or pricing rules change
pub const RATE_CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RateCacheEntry {
    first_item_cost: Decimal,
    additional_item_cost: Decimal,
    handling_time: HandlingTime,
    cached_at: DateTime<Utc>,
}

pub fn rate_cache_key(item: &LineItem, country: &CountryCode) -> String {
    format!("shipping:v{}:{}_{}_{}_{}", RATE_CACHE_VERSION, item.print_provider_id, item.blueprint_id, item.variant_id, country)
}

pub struct ShippingEstimator {
    rates: Arc<dyn RateLookup>,
    cache: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ShippingEstimator {
    pub fn new(rates: Arc<dyn RateLookup>, cache: Arc<dyn KeyValueStore>, ttl: Duration) -> Self { Self { rates, cache, ttl } }

    /// Prices `items` for `country`, charging providers in cart order.
    ///
    /// Cache misses cost one lookup per distinct (provider, blueprint) pair, issued
    /// concurrently. Items that cannot be priced are reported in `omitted`.
    #[instrument(skip_all, fields(country = %country, items = items.len()))]
    pub async fn estimate(&self, country: &CountryCode, items: &[LineItem]) -> ShippingEstimate {
        if items.is_empty() { return ShippingEstimate::empty(country.clone()); }

        let mut resolved: Vec<Result<ShippingRate, OmissionReason>> = vec![Err(OmissionReason::LookupFailed); items.len()];
        let mut misses: BTreeMap<(u64, u64), Vec<usize>> = BTreeMap::new();
        for (idx, item) in items.iter().enumerate() {
            match self.cached_rate(item, country).await {
                Some(rate) => resolved[idx] = Ok(rate),
                None => misses.entry((item.print_provider_id, item.blueprint_id)).or_default().push(idx),
            }
        }

        if !misses.is_empty() {
            debug!(lookups = misses.len(), "fetching shipping rates");
            let lookups = misses.keys().map(|&(provider, blueprint)| async move {
                ((provider, blueprint), self.rates.shipping_info(blueprint, provider).await)
            });
            for ((provider, blueprint), response) in join_all(lookups).await {
                let indices = &misses[&(provider, blueprint)];
                let info = match response {
                    Ok(info) => info,
                    Err(e) => {
                        warn!(provider, blueprint, error = %e, "shipping rate lookup failed");
                        continue;
                    }
                };
                for &idx in indices {
                    let item = &items[idx];
                    match info.rate_for(item.variant_id, country) {
                        Some(rate) => {
                            self.store_rate(item, country, &rate).await;
                            resolved[idx] = Ok(rate);
                        }
                        None => {
                            warn!(product_id = %item.product_id, variant_id = item.variant_id, "no applicable shipping profile");
                            resolved[idx] = Err(OmissionReason::NoApplicableProfile);
                        }
                    }
                }
            }
        }

        let mut ledger = ShippingLedger::new();
        for (item, rate) in items.iter().zip(resolved) {
            match rate {
                Ok(rate) => ledger.charge(item, &rate),
                Err(reason) => ledger.omit(item, reason),
            }
        }
        let estimate = ledger.finish(country.clone());
        if estimate.is_partial() {
            warn!(omitted = estimate.omitted.len(), total = %estimate.total, "shipping estimate is incomplete");
        }
        estimate
    }

    async fn cached_rate(&self, item: &LineItem, country: &CountryCode) -> Option<ShippingRate> {
        let key = rate_cache_key(item, country);
        let raw = match self.cache.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %key, error = %e, "rate cache read failed");
                return None;
            }
        };
        let entry: RateCacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "discarding unreadable rate cache entry");
                return None;
            }
        };
        if Utc::now() - entry.cached_at > self.ttl {
            debug!(key = %key, "rate cache entry expired");
            return None;
        }
        Some(ShippingRate { first_item_cost: entry.first_item_cost, additional_item_cost: entry.additional_item_cost, handling_time: entry.handling_time })
    }

    async fn store_rate(&self, item: &LineItem, country: &CountryCode, rate: &ShippingRate) {
        let key = rate_cache_key(item, country);
        let entry = RateCacheEntry {
            first_item_cost: rate.first_item_cost,
            additional_item_cost: rate.additional_item_cost,
            handling_time: rate.handling_time.clone(),
            cached_at: Utc::now(),
        };
        let result = match serde_json::to_string(&entry) {
            Ok(value) => self.cache.put(&key, value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result { warn!(key = %key, error = %e, "rate cache write failed"); }
    }
}
