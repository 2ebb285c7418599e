//! Products

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::TypedId;

/// Product identifier, unique within a cart or wishlist.
pub type ProductId = TypedId<ProductSnapshot>;

/// Errors raised when a catalog payload cannot be turned into a product snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// The payload has no identifier, or a blank one.
    #[error("product has no id")]
    MissingId,

    /// The payload has no display name.
    #[error("product {0} has no name")]
    MissingName(String),

    /// The payload has no price.
    #[error("product {0} has no price")]
    MissingPrice(String),

    /// The payload carries a negative price.
    #[error("product {0} has a negative price")]
    NegativePrice(String),
}

/// Product payload as served by the catalog API.
///
/// Every field is optional here; [`ProductSnapshot`] is the validated form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    /// Catalog identifier
    #[serde(default, alias = "_id", alias = "product_id")]
    pub id: Option<ProductId>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Brand name
    #[serde(default)]
    pub brand: Option<String>,

    /// Image reference
    #[serde(default, alias = "image_url")]
    pub image: Option<String>,

    /// Unit price
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// The product fields captured when an item is added to the cart or wishlist.
///
/// Prices are frozen at capture time; later catalog changes do not reach an
/// existing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogProduct")]
pub struct ProductSnapshot {
    id: ProductId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    price: Decimal,
}

impl ProductSnapshot {
    /// Create a snapshot from its required fields.
    ///
    /// # Errors
    ///
    /// Returns a [`ProductError`] if the id or name is blank or the price is negative.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Decimal,
    ) -> Result<Self, ProductError> {
        Self::try_from(CatalogProduct {
            id: Some(id.into()),
            name: Some(name.into()),
            price: Some(price),
            ..CatalogProduct::default()
        })
    }

    /// Attach a brand name.
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = non_blank(Some(brand.into()));
        self
    }

    /// Attach an image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = non_blank(Some(image.into()));
        self
    }

    /// Product identifier
    pub fn id(&self) -> &ProductId {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Brand name, if the catalog supplied one
    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    /// Image reference, if the catalog supplied one
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Unit price at capture time
    pub fn price(&self) -> Decimal {
        self.price
    }
}

impl TryFrom<CatalogProduct> for ProductSnapshot {
    type Error = ProductError;

    fn try_from(product: CatalogProduct) -> Result<Self, Self::Error> {
        let id = product
            .id
            .filter(|id| !id.is_blank())
            .ok_or(ProductError::MissingId)?;

        let name = non_blank(product.name)
            .ok_or_else(|| ProductError::MissingName(id.to_string()))?;

        let price = product
            .price
            .ok_or_else(|| ProductError::MissingPrice(id.to_string()))?;

        if price.is_sign_negative() && !price.is_zero() {
            return Err(ProductError::NegativePrice(id.to_string()));
        }

        Ok(Self {
            id,
            name,
            brand: non_blank(product.brand),
            image: non_blank(product.image),
            price,
        })
    }
}

impl From<ProductSnapshot> for CatalogProduct {
    fn from(snapshot: ProductSnapshot) -> Self {
        Self {
            id: Some(snapshot.id),
            name: Some(snapshot.name),
            brand: snapshot.brand,
            image: snapshot.image,
            price: Some(snapshot.price),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn catalog_payload_with_numeric_id_converts() -> TestResult {
        let snapshot: ProductSnapshot = serde_json::from_value(json!({
            "_id": 17,
            "name": "Trail Runner",
            "brand": "Nimbus",
            "image_url": "/img/trail.png",
            "price": "89.50"
        }))?;

        assert_eq!(snapshot.id().as_str(), "17");
        assert_eq!(snapshot.name(), "Trail Runner");
        assert_eq!(snapshot.brand(), Some("Nimbus"));
        assert_eq!(snapshot.image(), Some("/img/trail.png"));
        assert_eq!(snapshot.price(), Decimal::new(8950, 2));

        Ok(())
    }

    #[test]
    fn missing_name_is_rejected() {
        let result = ProductSnapshot::try_from(CatalogProduct {
            id: Some("p1".into()),
            name: Some("   ".to_string()),
            price: Some(Decimal::ONE),
            ..CatalogProduct::default()
        });

        assert_eq!(result, Err(ProductError::MissingName("p1".to_string())));
    }

    #[test]
    fn missing_id_is_rejected() {
        let result = ProductSnapshot::try_from(CatalogProduct {
            name: Some("Sock".to_string()),
            price: Some(Decimal::ONE),
            ..CatalogProduct::default()
        });

        assert_eq!(result, Err(ProductError::MissingId));
    }

    #[test]
    fn negative_price_is_rejected() {
        let result = ProductSnapshot::new("p1", "Sock", Decimal::new(-1, 0));

        assert_eq!(result, Err(ProductError::NegativePrice("p1".to_string())));
    }

    #[test]
    fn free_product_is_accepted() -> TestResult {
        let snapshot = ProductSnapshot::new("p1", "Sticker", Decimal::ZERO)?;

        assert_eq!(snapshot.price(), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn blank_optional_fields_are_dropped() -> TestResult {
        let snapshot = ProductSnapshot::new("p1", "Sock", Decimal::ONE)?
            .with_brand(" ")
            .with_image("");

        assert_eq!(snapshot.brand(), None);
        assert_eq!(snapshot.image(), None);

        Ok(())
    }
}
