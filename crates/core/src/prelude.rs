//! Storefront prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartError, CartItem},
    checkout::{
        CheckoutDraft, CheckoutFlow, CheckoutStep, Field, FieldError, LocatedAddress,
        PaymentMethod, ShippingDetails, TransitionError, ValidationErrors,
    },
    customers::{CustomerProfile, UserId},
    ids::TypedId,
    notifications::{DISPLAY_DURATION, Notification, Severity},
    orders::{
        NewOrder, Order, OrderId, OrderItem, OrderLookup, OrderStatus, PaymentDetails,
        TrackerView,
        receipt::{ReceiptError, write_receipt},
    },
    pricing::{RateCalculator, Totals, ZeroRates, format_money},
    products::{CatalogProduct, ProductError, ProductId, ProductSnapshot},
    searches::RecentSearches,
    wishlist::{Toggle, Wishlist, WishlistItem},
};
