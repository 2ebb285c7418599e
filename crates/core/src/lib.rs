//! Storefront
//!
//! Storefront is the commerce session and order-lifecycle engine behind a retail shop: cart and
//! wishlist state, the checkout step machine, order data contracts and the delivery tracker.

pub mod cart;
pub mod checkout;
pub mod customers;
pub mod ids;
pub mod notifications;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod searches;
pub mod wishlist;
