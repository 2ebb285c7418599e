//! Cart

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::products::{ProductId, ProductSnapshot};

/// Errors related to cart mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A quantity below one was supplied.
    #[error("quantity must be at least 1, got {0}")]
    QuantityBelowMinimum(i64),

    /// A quantity above the supported maximum was supplied.
    #[error("quantity {0} is too large")]
    QuantityTooLarge(i64),

    /// The product is not in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(String),

    /// The change would push the cart's value past what can be represented.
    #[error("cart total is too large")]
    AmountTooLarge,
}

/// A product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product fields captured when the line was created
    #[serde(flatten)]
    pub product: ProductSnapshot,

    /// Number of units, never below one
    pub quantity: u32,
}

impl CartItem {
    /// Product identifier of this line.
    pub fn id(&self) -> &ProductId {
        self.product.id()
    }

    /// Unit price multiplied by quantity.
    ///
    /// Lines held by a [`Cart`] never overflow; a detached line saturates.
    pub fn line_total(&self) -> Decimal {
        self.checked_line_total().unwrap_or(Decimal::MAX)
    }

    fn checked_line_total(&self) -> Option<Decimal> {
        self.product.price().checked_mul(Decimal::from(self.quantity))
    }
}

/// The shopping cart: at most one line per product, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from previously stored lines.
    ///
    /// Lines sharing a product id are merged. Lines with a zero quantity, and
    /// lines whose value cannot be added to the cart, are dropped, so the
    /// result always satisfies the cart invariants.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();

        for item in items {
            if item.quantity == 0 {
                continue;
            }

            let quantity = item.quantity;

            _ = cart.add(item.product, quantity);
        }

        cart
    }

    /// Restore a cart from its persisted JSON form.
    ///
    /// Individual malformed lines are skipped; only a payload that is not a
    /// JSON array at all is an error.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the payload is not a JSON array.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<Value> = serde_json::from_str(payload)?;

        Ok(Self::from_items(
            entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value::<CartItem>(entry).ok()),
        ))
    }

    /// Serialise the cart lines for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.items)
    }

    /// Add `quantity` units of a product, merging with an existing line.
    ///
    /// Returns the line's quantity after the addition.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::QuantityBelowMinimum`] if `quantity` is zero, or an
    /// error leaving the cart unchanged if the line or the cart's value would
    /// overflow.
    pub fn add(&mut self, product: ProductSnapshot, quantity: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::QuantityBelowMinimum(0));
        }

        if let Some(existing) = self.find_mut(product.id()) {
            let current = existing.quantity;

            existing.quantity = current
                .checked_add(quantity)
                .ok_or(CartError::QuantityTooLarge(
                    i64::from(current) + i64::from(quantity),
                ))?;

            if self.checked_subtotal().is_none() {
                self.set_quantity(&product, current);

                return Err(CartError::AmountTooLarge);
            }

            return Ok(current + quantity);
        }

        self.items.push(CartItem { product, quantity });

        if self.checked_subtotal().is_none() {
            self.items.pop();

            return Err(CartError::AmountTooLarge);
        }

        Ok(quantity)
    }

    /// Remove a product line, returning it if it was present.
    pub fn remove(&mut self, id: &ProductId) -> Option<CartItem> {
        let position = self.items.iter().position(|item| item.id() == id)?;

        Some(self.items.remove(position))
    }

    /// Replace a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the cart unchanged, if `quantity` is below one,
    /// too large, or the product is not in the cart.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: i64) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::QuantityBelowMinimum(quantity));
        }

        let quantity =
            u32::try_from(quantity).map_err(|_overflow| CartError::QuantityTooLarge(quantity))?;

        let item = self
            .find_mut(id)
            .ok_or_else(|| CartError::NotInCart(id.to_string()))?;

        let previous = item.quantity;

        item.quantity = quantity;

        if self.checked_subtotal().is_none() {
            if let Some(item) = self.find_mut(id) {
                item.quantity = previous;
            }

            return Err(CartError::AmountTooLarge);
        }

        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Look up a line by product id.
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// The cart lines in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Total number of units across all lines.
    pub fn count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of price × quantity over all lines.
    pub fn subtotal(&self) -> Decimal {
        self.checked_subtotal().unwrap_or(Decimal::MAX)
    }

    /// Number of distinct product lines.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn find_mut(&mut self, id: &ProductId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    fn set_quantity(&mut self, product: &ProductSnapshot, quantity: u32) {
        if let Some(item) = self.find_mut(product.id()) {
            item.quantity = quantity;
        }
    }

    fn checked_subtotal(&self) -> Option<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |sum, item| {
            sum.checked_add(item.checked_line_total()?)
        })
    }
}
