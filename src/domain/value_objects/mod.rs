//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catch-all destination used by shipping profiles and the country picker
pub const REST_OF_THE_WORLD: &str = "REST_OF_THE_WORLD";

/// Destination country: an ISO 3166 alpha-2 code or the rest-of-world sentinel
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CountryError> {
        let value = value.into().trim().to_uppercase();
        if value == REST_OF_THE_WORLD { return Ok(Self(value)); }
        if value.is_empty() { return Err(CountryError::Empty); }
        if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CountryError::Invalid(value));
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for CountryCode { fn default() -> Self { Self("US".to_string()) } }

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CountryCode> for String { fn from(c: CountryCode) -> Self { c.0 } }

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CountryError { Empty, Invalid(String) }
impl std::error::Error for CountryError {}
impl fmt::Display for CountryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "Country empty"), Self::Invalid(v) => write!(f, "Invalid country code: {}", v) }
    }
}

/// Identity of a line item in the cart
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemKey { pub product_id: String, pub variant_id: u64 }

impl LineItemKey {
    pub fn new(product_id: impl Into<String>, variant_id: u64) -> Self { Self { product_id: product_id.into(), variant_id } }
}

/// Money value object, always carried at two decimal places
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount: round_cents(amount), currency: currency.to_uppercase() } }
    /// Converts an integer amount in minor units (cents) as returned by the provider API
    pub fn from_minor(cents: i64, currency: &str) -> Self { Self::new(Decimal::new(cents, 2), currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    /// Amount in minor units, as hosted checkout providers expect
    pub fn to_minor(&self) -> i64 { (self.amount * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(i64::MAX) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", format_cents(self.amount)) }
}

/// Rounds half away from zero to two places and pins the scale so "4" renders as "4.00".
pub fn round_cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

pub fn format_cents(amount: Decimal) -> String { round_cents(amount).to_string() }

/// Line quantity bounded to `1..=max`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn one() -> Self { Self(1) }
    /// Returns `None` for non-positive requests, which callers treat as removal.
    pub fn clamped(requested: i64, max: u32) -> Option<Self> {
        if requested <= 0 { return None; }
        Some(Self(requested.min(i64::from(max.max(1))) as u32))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn increment(&self, max: u32) -> Self { Self(self.0.saturating_add(1).min(max.max(1))) }
}

impl Default for Quantity { fn default() -> Self { Self::one() } }
