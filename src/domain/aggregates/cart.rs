//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{round_cents, LineItemKey, Money, Quantity};

pub const DEFAULT_MAX_QUANTITY: u32 = 10;

/// One product variant in the cart. This is also the persisted layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub variant_id: u64,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub image: String,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
}

/// A product selection before it has a quantity. The unit price is rounded to cents when it enters a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub product_id: String,
    pub variant_id: u64,
    pub name: String,
    pub unit_price: Decimal,
    pub image: String,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
}

impl LineItem {
    pub fn key(&self) -> LineItemKey { LineItemKey::new(self.product_id.clone(), self.variant_id) }
    pub fn matches(&self, product_id: &str, variant_id: u64) -> bool { self.product_id == product_id && self.variant_id == variant_id }
    pub fn line_total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

impl NewLineItem {
    fn with_quantity(self, quantity: Quantity) -> LineItem {
        LineItem {
            product_id: self.product_id, variant_id: self.variant_id, name: self.name, unit_price: round_cents(self.unit_price),
            quantity: quantity.value(), image: self.image, blueprint_id: self.blueprint_id, print_provider_id: self.print_provider_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Cart {
    items: Vec<LineItem>,
    max_quantity: u32,
    currency: String,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new(currency: &str, max_quantity: u32) -> Self {
        Self { items: vec![], max_quantity: max_quantity.max(1), currency: currency.to_string(), events: vec![] }
    }

    /// Rebuilds a cart from persisted items, repairing duplicate keys and out-of-range quantities.
    pub fn restore(items: Vec<LineItem>, currency: &str, max_quantity: u32) -> Self {
        let mut cart = Self::new(currency, max_quantity);
        for mut item in items {
            let Some(quantity) = Quantity::clamped(i64::from(item.quantity), cart.max_quantity) else { continue };
            if cart.items.iter().any(|i| i.matches(&item.product_id, item.variant_id)) { continue; }
            item.quantity = quantity.value();
            item.unit_price = round_cents(item.unit_price);
            cart.items.push(item);
        }
        cart
    }

    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds one unit; an existing line is incremented up to the maximum.
    pub fn add(&mut self, item: NewLineItem) {
        let max = self.max_quantity;
        if let Some(existing) = self.items.iter_mut().find(|i| i.matches(&item.product_id, item.variant_id)) {
            let quantity = Quantity::clamped(i64::from(existing.quantity), max).unwrap_or_default().increment(max);
            existing.quantity = quantity.value();
            let key = existing.key();
            self.raise_event(DomainEvent::Cart(CartEvent::QuantityChanged { key, quantity: quantity.value() }));
        } else {
            let line = item.with_quantity(Quantity::one());
            let key = line.key();
            self.items.push(line);
            self.raise_event(DomainEvent::Cart(CartEvent::ItemAdded { key, quantity: 1 }));
        }
    }

    /// Replaces the quantity. Non-positive quantities remove the line; unknown keys are ignored.
    pub fn update(&mut self, product_id: &str, variant_id: u64, quantity: i64) -> bool {
        let Some(quantity) = Quantity::clamped(quantity, self.max_quantity) else {
            return self.remove(product_id, variant_id);
        };
        let Some(existing) = self.items.iter_mut().find(|i| i.matches(product_id, variant_id)) else { return false };
        existing.quantity = quantity.value();
        let key = existing.key();
        self.raise_event(DomainEvent::Cart(CartEvent::QuantityChanged { key, quantity: quantity.value() }));
        true
    }

    /// Returns whether a line was removed. Unknown keys are ignored.
    pub fn remove(&mut self, product_id: &str, variant_id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|i| !i.matches(product_id, variant_id));
        if self.items.len() == before { return false; }
        self.raise_event(DomainEvent::Cart(CartEvent::ItemRemoved { key: LineItemKey::new(product_id, variant_id) }));
        if self.items.is_empty() { self.raise_event(DomainEvent::Cart(CartEvent::Emptied)); }
        true
    }

    pub fn total_item_price(&self) -> Money {
        Money::new(self.items.iter().map(LineItem::line_total).sum(), &self.currency)
    }

    pub fn total_items(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}
