//! Shipping rates, profile selection and per-provider cost accrual

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::cart::LineItem;
use crate::domain::value_objects::{round_cents, CountryCode, LineItemKey, Money, REST_OF_THE_WORLD};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlingTime { pub value: u32, pub unit: String }

impl Default for HandlingTime { fn default() -> Self { Self { value: 10, unit: "day".into() } } }

/// Provider-side cost in minor units
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCost { pub cost: i64, #[serde(default = "default_currency")] pub currency: String }

fn default_currency() -> String { "USD".into() }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingProfile {
    pub variant_ids: Vec<u64>,
    pub first_item: ProfileCost,
    pub additional_items: ProfileCost,
    pub countries: Vec<String>,
}

impl ShippingProfile {
    fn ships_to(&self, country: &str) -> bool { self.countries.iter().any(|c| c == country) }
}

/// Rate-lookup response for one (blueprint, print provider) pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    #[serde(default)]
    pub handling_time: HandlingTime,
    pub profiles: Vec<ShippingProfile>,
}

impl ShippingInfo {
    /// First profile covering both variant and country, else the rest-of-world profile.
    pub fn select_profile(&self, variant_id: u64, country: &CountryCode) -> Option<&ShippingProfile> {
        self.profiles
            .iter()
            .find(|p| p.variant_ids.contains(&variant_id) && p.ships_to(country.as_str()))
            .or_else(|| self.profiles.iter().find(|p| p.ships_to(REST_OF_THE_WORLD)))
    }

    pub fn rate_for(&self, variant_id: u64, country: &CountryCode) -> Option<ShippingRate> {
        self.select_profile(variant_id, country).map(|p| ShippingRate {
            first_item_cost: Money::from_minor(p.first_item.cost, &p.first_item.currency).amount(),
            additional_item_cost: Money::from_minor(p.additional_items.cost, &p.additional_items.currency).amount(),
            handling_time: self.handling_time.clone(),
        })
    }
}

/// Resolved pricing for one line item and destination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub first_item_cost: Decimal,
    pub additional_item_cost: Decimal,
    pub handling_time: HandlingTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OmissionReason { LookupFailed, NoApplicableProfile }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedItem { pub key: LineItemKey, pub print_provider_id: u64, pub reason: OmissionReason }

/// Result of one shipping computation. Items without a rate are listed in `omitted`
/// instead of silently lowering the total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingEstimate {
    pub country: CountryCode,
    pub total: Decimal,
    pub by_provider: BTreeMap<u64, Decimal>,
    pub handling_times: BTreeMap<u64, HandlingTime>,
    pub omitted: Vec<OmittedItem>,
}

impl ShippingEstimate {
    pub fn empty(country: CountryCode) -> Self {
        Self { country, total: round_cents(Decimal::ZERO), by_provider: BTreeMap::new(), handling_times: BTreeMap::new(), omitted: vec![] }
    }
    pub fn is_partial(&self) -> bool { !self.omitted.is_empty() }
    pub fn total_display(&self) -> String { round_cents(self.total).to_string() }
}

/// Accrues shipping per provider in the order items are charged.
///
/// The first line charged to a provider pays `first + additional * (qty - 1)`; every
/// later line for that provider pays its own `additional * qty`.
#[derive(Debug, Default)]
pub struct ShippingLedger {
    by_provider: BTreeMap<u64, Decimal>,
    handling_times: BTreeMap<u64, HandlingTime>,
    omitted: Vec<OmittedItem>,
}

impl ShippingLedger {
    pub fn new() -> Self { Self::default() }

    pub fn charge(&mut self, item: &LineItem, rate: &ShippingRate) {
        let quantity = Decimal::from(item.quantity);
        match self.by_provider.get_mut(&item.print_provider_id) {
            Some(accrued) => *accrued += rate.additional_item_cost * quantity,
            None => {
                let cost = rate.first_item_cost + rate.additional_item_cost * (quantity - Decimal::ONE);
                self.by_provider.insert(item.print_provider_id, cost);
                self.handling_times.insert(item.print_provider_id, rate.handling_time.clone());
            }
        }
    }

    pub fn omit(&mut self, item: &LineItem, reason: OmissionReason) {
        self.omitted.push(OmittedItem { key: item.key(), print_provider_id: item.print_provider_id, reason });
    }

    pub fn finish(self, country: CountryCode) -> ShippingEstimate {
        let by_provider: BTreeMap<u64, Decimal> = self.by_provider.into_iter().map(|(p, c)| (p, round_cents(c))).collect();
        let total = round_cents(by_provider.values().copied().sum());
        ShippingEstimate { country, total, by_provider, handling_times: self.handling_times, omitted: self.omitted }
    }
}
