//! Session cart backed by the key-value store

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::CartSettings;
use crate::domain::aggregates::{Cart, LineItem, NewLineItem, ShippingEstimate};
use crate::domain::events::{CartEvent, DomainEvent, ShippingEvent};
use crate::domain::value_objects::{CountryCode, Money};
use crate::ports::KeyValueStore;
use crate::Result;

const ZERO_SHIPPING: &str = "0.00";

pub fn items_key(session: &str) -> String { format!("cart:{}:items", session) }
pub fn shipping_total_key(session: &str) -> String { format!("cart:{}:shipping_total", session) }
pub fn country_key(session: &str) -> String { format!("cart:{}:country", session) }

/// Snapshot handed to the estimator. Only the newest ticket's result is applied.
#[derive(Debug, Clone)]
pub struct EstimateTicket {
    pub generation: u64,
    pub country: CountryCode,
    pub items: Vec<LineItem>,
}

/// A shopper's cart, country and last shipping total.
///
/// Only obtainable through [`CartStore::load`], so every mutation happens after the
/// persisted state has been read. Each mutation rewrites the persisted copy.
pub struct CartStore {
    session: String,
    cart: Cart,
    country: CountryCode,
    shipping_total: String,
    last_estimate: Option<ShippingEstimate>,
    generation: u64,
    store: Arc<dyn KeyValueStore>,
    events: Vec<DomainEvent>,
}

impl CartStore {
    pub async fn load(session: impl Into<String>, store: Arc<dyn KeyValueStore>, settings: &CartSettings) -> Result<Self> {
        let session = session.into();

        let items = match store.get(&items_key(&session)).await? {
            None => vec![],
            Some(raw) => serde_json::from_str::<Vec<LineItem>>(&raw).unwrap_or_else(|e| {
                warn!(session = %session, error = %e, "discarding unreadable persisted cart");
                vec![]
            }),
        };
        let cart = Cart::restore(items, &settings.currency, settings.max_quantity);

        let country = match store.get(&country_key(&session)).await? {
            Some(raw) => CountryCode::new(raw).unwrap_or_default(),
            None => CountryCode::default(),
        };
        let shipping_total = match store.get(&shipping_total_key(&session)).await? {
            Some(raw) if !cart.is_empty() => raw,
            _ => ZERO_SHIPPING.to_string(),
        };

        debug!(session = %session, items = cart.items().len(), country = %country, "cart loaded");
        Ok(Self { session, cart, country, shipping_total, last_estimate: None, generation: 0, store, events: vec![] })
    }

    pub fn session(&self) -> &str { &self.session }
    pub fn items(&self) -> &[LineItem] { self.cart.items() }
    pub fn country(&self) -> &CountryCode { &self.country }
    pub fn shipping_total(&self) -> &str { &self.shipping_total }
    pub fn last_estimate(&self) -> Option<&ShippingEstimate> { self.last_estimate.as_ref() }
    pub fn total_item_price(&self) -> Money { self.cart.total_item_price() }
    pub fn total_items(&self) -> u32 { self.cart.total_items() }

    pub async fn add(&mut self, item: NewLineItem) {
        self.cart.add(item);
        self.after_cart_change().await;
    }

    /// Returns false when the key is not in the cart.
    pub async fn update(&mut self, product_id: &str, variant_id: u64, quantity: i64) -> bool {
        let changed = self.cart.update(product_id, variant_id, quantity);
        if changed { self.after_cart_change().await; }
        changed
    }

    /// Returns false when the key is not in the cart.
    pub async fn remove(&mut self, product_id: &str, variant_id: u64) -> bool {
        let changed = self.cart.remove(product_id, variant_id);
        if changed { self.after_cart_change().await; }
        changed
    }

    pub async fn set_country(&mut self, country: CountryCode) {
        if country != self.country {
            self.events.push(DomainEvent::Cart(CartEvent::CountryChanged { country: country.clone() }));
            self.country = country;
            self.generation += 1;
        }
        self.write(country_key(&self.session), self.country.to_string()).await;
    }

    /// Starts a shipping computation for the current cart and country.
    pub fn begin_estimate(&mut self) -> EstimateTicket {
        self.generation += 1;
        EstimateTicket { generation: self.generation, country: self.country.clone(), items: self.cart.items().to_vec() }
    }

    /// Stores the estimate if no newer estimate or cart change has happened since `generation`.
    pub async fn apply_estimate(&mut self, generation: u64, estimate: ShippingEstimate) -> bool {
        if generation != self.generation {
            debug!(session = %self.session, generation, current = self.generation, "discarding stale shipping estimate");
            self.events.push(DomainEvent::Shipping(ShippingEvent::EstimateDiscarded { generation }));
            return false;
        }
        self.shipping_total = estimate.total_display();
        self.events.push(DomainEvent::Shipping(ShippingEvent::Estimated {
            country: estimate.country.clone(),
            total: estimate.total,
            partial: estimate.is_partial(),
        }));
        self.last_estimate = Some(estimate);
        self.write(shipping_total_key(&self.session), self.shipping_total.clone()).await;
        true
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    async fn after_cart_change(&mut self) {
        self.events.append(&mut self.cart.take_events());
        self.generation += 1;
        self.last_estimate = None;
        match serde_json::to_string(self.cart.items()) {
            Ok(raw) => self.write(items_key(&self.session), raw).await,
            Err(e) => warn!(session = %self.session, error = %e, "failed to encode cart"),
        }
        if self.cart.is_empty() {
            self.shipping_total = ZERO_SHIPPING.to_string();
            self.write(shipping_total_key(&self.session), self.shipping_total.clone()).await;
        }
    }

    async fn write(&self, key: String, value: String) {
        if let Err(e) = self.store.put(&key, value).await {
            warn!(session = %self.session, key = %key, error = %e, "failed to persist cart state");
        }
    }
}
