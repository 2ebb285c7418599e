//! Customers

use serde::{Deserialize, Serialize};

use crate::ids::TypedId;

/// Opaque identifier of a signed-in customer.
pub type UserId = TypedId<CustomerProfile>;

/// What the storefront knows about a signed-in customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Account identifier
    #[serde(default, alias = "_id", alias = "user_id")]
    pub id: Option<UserId>,

    /// Account email
    pub email: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,

    /// Street address
    #[serde(default)]
    pub address: Option<String>,

    /// City
    #[serde(default)]
    pub city: Option<String>,

    /// Postal code
    #[serde(default)]
    pub postal_code: Option<String>,
}
