//! Checkout Draft

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::customers::CustomerProfile;

/// How the shopper pays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid to the courier on delivery; no gateway round-trip.
    #[default]
    #[serde(alias = "cod")]
    CashOnDelivery,

    /// Paid up front through the payment gateway.
    #[serde(alias = "paypal", alias = "card")]
    Online,
}

impl PaymentMethod {
    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cash_on_delivery",
            Self::Online => "online",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CashOnDelivery => "Cash on delivery",
            Self::Online => "Online payment",
        })
    }
}

/// A checkout form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Contact email
    Email,
    /// Recipient name
    Name,
    /// Street address
    Address,
    /// City
    City,
    /// Postal code
    PostalCode,
    /// Phone number
    Phone,
}

impl Field {
    /// Every field, in form order.
    pub const ALL: [Field; 6] = [
        Field::Email,
        Field::Name,
        Field::Address,
        Field::City,
        Field::PostalCode,
        Field::Phone,
    ];

    /// Label shown next to the field.
    pub fn label(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Name => "name",
            Self::Address => "address",
            Self::City => "city",
            Self::PostalCode => "postal code",
            Self::Phone => "phone",
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The field is empty.
    #[error("{} is required", .0.label())]
    Missing(Field),

    /// The email address is not well formed.
    #[error("email address is not valid")]
    InvalidEmail,
}

impl FieldError {
    /// The field this error belongs to.
    pub fn field(self) -> Field {
        match self {
            Self::Missing(field) => field,
            Self::InvalidEmail => Field::Email,
        }
    }
}

/// All validation failures for a draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("checkout details are incomplete ({} problem(s))", .0.len())]
pub struct ValidationErrors(SmallVec<[FieldError; 6]>);

impl ValidationErrors {
    /// The individual failures, in form order.
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// The failure recorded for a field, if any.
    pub fn for_field(&self, field: Field) -> Option<FieldError> {
        self.0.iter().copied().find(|error| error.field() == field)
    }
}

/// Validated contact and shipping data, trimmed and ready to submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingDetails {
    /// Contact email
    pub email: String,
    /// Recipient name
    pub name: String,
    /// Street address
    pub address: String,
    /// City
    pub city: String,
    /// Postal code
    pub postal_code: String,
    /// Phone number
    pub phone: String,
}

/// An address located for the shopper, used to pre-fill the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatedAddress {
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
}

/// The in-progress order form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutDraft {
    /// Contact email
    pub email: String,
    /// Recipient name
    pub name: String,
    /// Street address
    pub address: String,
    /// City
    pub city: String,
    /// Postal code
    pub postal_code: String,
    /// Phone number
    pub phone: String,
    /// Selected payment method
    pub payment_method: PaymentMethod,
}

impl CheckoutDraft {
    /// Start a draft from a signed-in customer's profile.
    pub fn prefilled(profile: &CustomerProfile) -> Self {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();

        Self {
            email: profile.email.clone(),
            name: field(&profile.name),
            address: field(&profile.address),
            city: field(&profile.city),
            postal_code: field(&profile.postal_code),
            phone: field(&profile.phone),
            payment_method: PaymentMethod::default(),
        }
    }

    /// Fill shipping fields from a located address.
    ///
    /// Only blank fields are written; anything the shopper typed is kept.
    pub fn apply_located_address(&mut self, located: LocatedAddress) {
        fill_blank(&mut self.address, located.address);
        fill_blank(&mut self.city, located.city);
        fill_blank(&mut self.postal_code, located.postal_code);
    }

    /// Current value of a field.
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Email => &self.email,
            Field::Name => &self.name,
            Field::Address => &self.address,
            Field::City => &self.city,
            Field::PostalCode => &self.postal_code,
            Field::Phone => &self.phone,
        }
    }

    /// Check every field, returning the trimmed details when all pass.
    ///
    /// # Errors
    ///
    /// Returns every failing field, not just the first.
    pub fn validate(&self) -> Result<ShippingDetails, ValidationErrors> {
        let mut errors = SmallVec::new();

        for field in Field::ALL {
            let value = self.value(field).trim();

            if value.is_empty() {
                errors.push(FieldError::Missing(field));
            } else if field == Field::Email && !is_valid_email(value) {
                errors.push(FieldError::InvalidEmail);
            }
        }

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        Ok(ShippingDetails {
            email: self.email.trim().to_string(),
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            phone: self.phone.trim().to_string(),
        })
    }
}

/// Basic shape check: one `@`, a non-empty local part, and a dotted domain.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn fill_blank(target: &mut String, value: Option<String>) {
    if !target.trim().is_empty() {
        return;
    }

    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        *target = value.trim().to_string();
    }
}
