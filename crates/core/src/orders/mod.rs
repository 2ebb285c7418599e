//! Orders
//!
//! Orders are owned by the order service. The client builds a [`NewOrder`]
//! from the cart at checkout and afterwards only ever reads [`Order`]
//! snapshots back.

use jiff::{Timestamp, civil::DateTime, tz::TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    cart::{Cart, CartItem},
    checkout::{FieldError, PaymentMethod, ShippingDetails, is_valid_email},
    customers::UserId,
    ids::TypedId,
    pricing::Totals,
    products::ProductId,
};

pub mod receipt;
pub mod status;
pub mod tracker;

pub use status::{OrderStatus, PIPELINE};
pub use tracker::{Stage, TrackerView};

/// Server-assigned order identifier.
pub type OrderId = TypedId<Order>;

/// A line of an order, priced at the moment the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product the line was bought from
    #[serde(
        default,
        rename = "id",
        alias = "product_id",
        alias = "_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_id: Option<ProductId>,

    /// Product name at order time
    pub name: String,

    /// Units ordered
    pub quantity: u32,

    /// Unit price at order time
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,

    /// Brand at order time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    /// Image reference at order time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OrderItem {
    /// Unit price multiplied by quantity, saturating on overflow.
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: Some(item.id().clone()),
            name: item.product.name().to_string(),
            quantity: item.quantity,
            price: item.product.price(),
            brand: item.product.brand().map(str::to_string),
            image: item.product.image().map(str::to_string),
        }
    }
}

/// The gateway's capture result, stored verbatim for audit display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentDetails(Value);

impl PaymentDetails {
    /// Wrap a raw capture payload.
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// The raw capture payload.
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Gateway transaction id: the first capture's id, else the order id.
    pub fn transaction_id(&self) -> Option<&str> {
        self.0
            .pointer("/purchase_units/0/payments/captures/0/id")
            .or_else(|| self.0.get("id"))
            .and_then(Value::as_str)
    }

    /// Capture status reported by the gateway.
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    /// Email of the paying account.
    pub fn payer_email(&self) -> Option<&str> {
        self.0.pointer("/payer/email_address").and_then(Value::as_str)
    }

    /// Whether the gateway reported the payment as completed.
    pub fn is_completed(&self) -> bool {
        self.status()
            .is_some_and(|status| status.eq_ignore_ascii_case("completed"))
    }
}

/// A persisted order as served by the order service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    #[serde(alias = "order_id", alias = "_id")]
    pub id: OrderId,

    /// Owning account, absent for guest orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Lines as priced at order time
    #[serde(default)]
    pub items: Vec<OrderItem>,

    /// Amount charged, fixed at creation
    #[serde(alias = "total")]
    pub total_amount: Decimal,

    /// Contact and shipping details
    #[serde(flatten)]
    pub shipping: ShippingDetails,

    /// How the order was paid
    #[serde(default)]
    pub payment_method: PaymentMethod,

    /// Capture record for online payments
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,

    /// Delivery status
    #[serde(default)]
    pub status: OrderStatus,

    /// When the order was placed
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<Timestamp>,
}

impl Order {
    /// Sum of the stored line totals.
    pub fn items_total(&self) -> Decimal {
        self.items
            .iter()
            .map(OrderItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Total number of units ordered.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Delivery tracker for the current status.
    pub fn tracker(&self) -> TrackerView {
        TrackerView::for_status(self.status)
    }
}

/// Accepts RFC 3339 timestamps and zone-less `YYYY-MM-DD HH:MM:SS` values,
/// which are read as UTC. Anything unparseable becomes `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(timestamp) = raw.parse::<Timestamp>() {
        return Ok(Some(timestamp));
    }

    Ok(raw
        .parse::<DateTime>()
        .and_then(|civil| civil.to_zoned(TimeZone::UTC))
        .map(|zoned| zoned.timestamp())
        .ok())
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    /// Signed-in account placing the order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Contact and shipping details
    #[serde(flatten)]
    pub shipping: ShippingDetails,

    /// Cart lines captured at submission time
    pub items: Vec<OrderItem>,

    /// Amount to charge
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total: Decimal,

    /// How the order is paid
    pub payment_method: PaymentMethod,

    /// Capture record; `null` for cash on delivery
    pub payment_details: Option<PaymentDetails>,
}

impl NewOrder {
    /// Snapshot the cart into an order request.
    pub fn from_cart(
        cart: &Cart,
        shipping: ShippingDetails,
        payment_method: PaymentMethod,
        totals: &Totals,
    ) -> Self {
        Self {
            user_id: None,
            shipping,
            items: cart.items().iter().map(OrderItem::from).collect(),
            total: totals.total,
            payment_method,
            payment_details: None,
        }
    }

    /// Attribute the order to a signed-in account.
    #[must_use]
    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Attach the gateway's capture record.
    #[must_use]
    pub fn with_payment_details(mut self, details: PaymentDetails) -> Self {
        self.payment_details = Some(details);
        self
    }

    /// The order as it will read back once the service has assigned an id.
    pub fn into_order(self, id: OrderId, created_at: Timestamp) -> Order {
        Order {
            id,
            user_id: self.user_id,
            items: self.items,
            total_amount: self.total,
            shipping: self.shipping,
            payment_method: self.payment_method,
            payment_details: self.payment_details,
            status: OrderStatus::Pending,
            created_at: Some(created_at),
        }
    }
}

/// Whose orders to fetch.
///
/// Guests are identified by email alone. Anyone who knows the address can
/// list that guest's orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLookup {
    /// A signed-in account.
    User(UserId),

    /// A guest, by the email captured at order time.
    Guest(String),
}

impl OrderLookup {
    /// Guest lookup for a well-formed email address.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] when the email is blank or malformed.
    pub fn guest(email: &str) -> Result<Self, FieldError> {
        let email = email.trim();

        if email.is_empty() {
            return Err(FieldError::Missing(crate::checkout::Field::Email));
        }

        if !is_valid_email(email) {
            return Err(FieldError::InvalidEmail);
        }

        Ok(Self::Guest(email.to_string()))
    }

    /// Query parameter for `GET /orders`.
    pub fn query(&self) -> (&'static str, &str) {
        match self {
            Self::User(id) => ("user_id", id.as_str()),
            Self::Guest(email) => ("email", email),
        }
    }
}
