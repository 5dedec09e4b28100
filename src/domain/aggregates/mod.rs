//! Aggregates module
pub mod product;
pub mod cart;
pub mod shipping;

pub use product::{ProductError, ProductImage, ShopProduct, UploadedImage, Variant};
pub use cart::{Cart, LineItem, NewLineItem, DEFAULT_MAX_QUANTITY};
pub use shipping::{HandlingTime, OmissionReason, OmittedItem, ProfileCost, ShippingEstimate, ShippingInfo, ShippingLedger, ShippingProfile, ShippingRate};
