//! Checkout

pub mod draft;
pub mod flow;

pub use draft::{
    CheckoutDraft, Field, FieldError, LocatedAddress, PaymentMethod, ShippingDetails,
    ValidationErrors, is_valid_email,
};
pub use flow::{CheckoutFlow, CheckoutStep, TransitionError};
