//! Application services: session carts, shipping estimation, checkout handoff
pub mod cart_store;
pub mod checkout;
pub mod sessions;
pub mod shipping;

pub use cart_store::{CartStore, EstimateTicket};
pub use checkout::{CheckoutSessionRequest, OrderTotals};
pub use sessions::{SessionRegistry, SharedCart};
pub use shipping::ShippingEstimator;
