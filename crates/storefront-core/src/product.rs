//! Catalog product type.
//!
//! Products are owned by the catalog; the cart and orders only take
//! snapshots of them.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::ProductId;

/// A product as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Catalog identifier.
    pub id: ProductId,

    /// Display name.
    pub name: String,

    /// Unit price in the smallest displayed currency unit. Never negative.
    pub price: i64,

    /// Image URL.
    #[serde(default)]
    pub image: String,

    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Category name used by the category listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Brand name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl Product {
    /// Create a product with only the required fields.
    #[must_use]
    pub fn new(id: ProductId, name: impl Into<String>, price: i64, image: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            image: image.into(),
            description: None,
            category: None,
            brand: None,
        }
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the brand.
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the fields the pricing rules depend on.
    ///
    /// # Errors
    ///
    /// - `CoreError::InvalidPrice` if the price is negative.
    /// - `CoreError::MissingField` if the name is blank.
    pub fn validate(&self) -> Result<()> {
        if self.price < 0 {
            return Err(CoreError::InvalidPrice {
                product_id: self.id.to_string(),
                price: self.price,
            });
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::MissingField("name"));
        }
        Ok(())
    }
}
