//! Wishlist

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::products::{ProductId, ProductSnapshot};

/// A saved product. Carries the same snapshot as a cart line, without a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WishlistItem(ProductSnapshot);

impl WishlistItem {
    /// Product identifier
    pub fn id(&self) -> &ProductId {
        self.0.id()
    }

    /// Captured product fields
    pub fn product(&self) -> &ProductSnapshot {
        &self.0
    }
}

/// Result of toggling a product's wishlist membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The product was absent and has been added.
    Added,

    /// The product was present and has been removed.
    Removed,
}

/// Set of saved products, kept in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
    index: FxHashSet<ProductId>,
}

impl Wishlist {
    /// Create an empty wishlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a wishlist from stored entries, keeping the first of any duplicates.
    pub fn from_items(items: impl IntoIterator<Item = WishlistItem>) -> Self {
        let mut wishlist = Self::new();

        for item in items {
            if wishlist.index.insert(item.id().clone()) {
                wishlist.items.push(item);
            }
        }

        wishlist
    }

    /// Restore a wishlist from its persisted JSON form, skipping malformed entries.
    ///
    /// # Errors
    ///
    /// Returns the parse error when the payload is not a JSON array.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<Value> = serde_json::from_str(payload)?;

        Ok(Self::from_items(
            entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value::<WishlistItem>(entry).ok()),
        ))
    }

    /// Serialise the wishlist for persistence.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.items)
    }

    /// Add the product if absent, remove it if present.
    pub fn toggle(&mut self, product: ProductSnapshot) -> Toggle {
        if self.index.remove(product.id()) {
            self.items.retain(|item| item.id() != product.id());

            return Toggle::Removed;
        }

        self.index.insert(product.id().clone());
        self.items.push(WishlistItem(product));

        Toggle::Added
    }

    /// Whether the product is saved.
    pub fn contains(&self, id: &ProductId) -> bool {
        self.index.contains(id)
    }

    /// Saved products in insertion order.
    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    /// Number of saved products.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is saved.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PartialEq for Wishlist {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for Wishlist {}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn toggle_twice_restores_membership() -> TestResult {
        let mut wishlist = Wishlist::new();
        let lamp = ProductSnapshot::new("lamp", "Desk Lamp", Decimal::new(2500, 2))?;

        assert_eq!(wishlist.toggle(lamp.clone()), Toggle::Added);
        assert!(wishlist.contains(lamp.id()));

        assert_eq!(wishlist.toggle(lamp.clone()), Toggle::Removed);
        assert!(!wishlist.contains(lamp.id()));
        assert!(wishlist.is_empty());

        Ok(())
    }

    #[test]
    fn duplicates_in_storage_are_collapsed() -> TestResult {
        let lamp = ProductSnapshot::new("lamp", "Desk Lamp", Decimal::new(2500, 2))?;

        let wishlist = Wishlist::from_items([
            WishlistItem(lamp.clone()),
            WishlistItem(lamp.clone()),
        ]);

        assert_eq!(wishlist.len(), 1);

        Ok(())
    }

    #[test]
    fn json_round_trip_preserves_entries() -> TestResult {
        let mut wishlist = Wishlist::new();
        wishlist.toggle(ProductSnapshot::new("a", "A", Decimal::ONE)?);
        wishlist.toggle(ProductSnapshot::new("b", "B", Decimal::TWO)?.with_image("/b.png"));

        let restored = Wishlist::from_json(&wishlist.to_json()?)?;

        assert_eq!(restored, wishlist);
        assert!(restored.contains(&"b".into()));

        Ok(())
    }
}
