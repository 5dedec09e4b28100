//! Storefront domain: cart, shipping and catalog types
pub mod aggregates;
pub mod events;
pub mod value_objects;
