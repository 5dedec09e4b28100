//! Order totals and the hosted-checkout handoff payload

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::CheckoutSettings;
use crate::domain::aggregates::{Cart, ShippingEstimate};
use crate::domain::value_objects::Money;
use crate::{Result, StorefrontError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTotals {
    pub items: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    /// Set when some items could not be priced for shipping
    pub shipping_partial: bool,
}

impl OrderTotals {
    pub fn compute(cart: &Cart, shipping: &ShippingEstimate, tax_rate: Decimal) -> Self {
        let items = cart.total_item_price();
        let currency = items.currency().to_string();
        let shipping_money = Money::new(shipping.total, &currency);
        let tax = Money::new(items.amount() * tax_rate, &currency);
        let total = Money::new(items.amount() + shipping_money.amount() + tax.amount(), &currency);
        Self { items, shipping: shipping_money, tax, total, shipping_partial: shipping.is_partial() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutLineItem { pub price_data: PriceData, pub quantity: u32 }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceData { pub currency: String, pub product_data: ProductData, pub unit_amount: i64 }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductData {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Payload for the payment provider's checkout-session endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutSessionRequest {
    pub mode: &'static str,
    pub payment_method_types: Vec<&'static str>,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    pub fn build(cart: &Cart, totals: &OrderTotals, settings: &CheckoutSettings) -> Result<Self> {
        if cart.is_empty() { return Err(StorefrontError::EmptyCart); }
        let line = |name: String, images: Vec<String>, amount: &Money, quantity: u32| CheckoutLineItem {
            price_data: PriceData { currency: settings.currency.clone(), product_data: ProductData { name, images }, unit_amount: amount.to_minor() },
            quantity,
        };

        let mut line_items: Vec<CheckoutLineItem> = cart
            .items()
            .iter()
            .map(|item| {
                let images = if item.image.is_empty() { vec![] } else { vec![item.image.clone()] };
                line(format!("{} - {}", item.name, item.variant_id), images, &Money::new(item.unit_price, totals.items.currency()), item.quantity)
            })
            .collect();
        if !totals.shipping.is_zero() { line_items.push(line("Shipping".into(), vec![], &totals.shipping, 1)); }
        if !totals.tax.is_zero() { line_items.push(line("Tax".into(), vec![], &totals.tax, 1)); }

        Ok(Self {
            mode: "payment",
            payment_method_types: vec!["card"],
            line_items,
            success_url: settings.success_url.clone(),
            cancel_url: settings.cancel_url.clone(),
        })
    }

    /// Sum the payment provider will charge, in minor units
    pub fn amount_total(&self) -> i64 {
        self.line_items.iter().map(|l| l.price_data.unit_amount * i64::from(l.quantity)).sum()
    }
}
