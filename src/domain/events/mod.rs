//! Domain events
use crate::domain::value_objects::{CountryCode, LineItemKey};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Cart(CartEvent),
    Shipping(ShippingEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { key: LineItemKey, quantity: u32 },
    QuantityChanged { key: LineItemKey, quantity: u32 },
    ItemRemoved { key: LineItemKey },
    Emptied,
    CountryChanged { country: CountryCode },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShippingEvent {
    Estimated { country: CountryCode, total: Decimal, partial: bool },
    EstimateDiscarded { generation: u64 },
}

impl DomainEvent {
    /// NATS subject suffix
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Cart(CartEvent::ItemAdded { .. }) => "cart.item_added",
            Self::Cart(CartEvent::QuantityChanged { .. }) => "cart.quantity_changed",
            Self::Cart(CartEvent::ItemRemoved { .. }) => "cart.item_removed",
            Self::Cart(CartEvent::Emptied) => "cart.emptied",
            Self::Cart(CartEvent::CountryChanged { .. }) => "cart.country_changed",
            Self::Shipping(ShippingEvent::Estimated { .. }) => "shipping.estimated",
            Self::Shipping(ShippingEvent::EstimateDiscarded { .. }) => "shipping.estimate_discarded",
        }
    }
}
