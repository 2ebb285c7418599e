//! Storefront session services: persistence, notifications, the cart store,
//! checkout submission and the order, payment and geocoding clients.

pub mod cart_store;
pub mod checkout;
pub mod context;
pub mod geolocation;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod persistence;
pub mod searches;
