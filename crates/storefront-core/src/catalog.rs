//! Catalog browsing helpers: keyword search, category filter, price sort.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use crate::product::Product;

/// Price ordering offered by the product listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSort {
    /// Keep catalog order.
    #[default]
    Default,
    /// Cheapest first.
    LowToHigh,
    /// Most expensive first.
    HighToLow,
}

/// Find products whose name, category or brand contains `keyword`,
/// ignoring case.
///
/// A blank keyword matches nothing.
pub fn search<'a>(products: &'a [Product], keyword: &str) -> Vec<&'a Product> {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return Vec::new();
    }

    let contains = |field: Option<&str>| {
        field.is_some_and(|value| value.to_lowercase().contains(&keyword))
    };

    products
        .iter()
        .filter(|p| {
            contains(Some(p.name.as_str()))
                || contains(p.category.as_deref())
                || contains(p.brand.as_deref())
        })
        .collect()
}

/// Products in exactly `category`.
pub fn filter_by_category<'a>(products: &'a [Product], category: &str) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| p.category.as_deref() == Some(category))
        .collect()
}

/// Sort in place by price. The sort is stable, so equal prices keep
/// catalog order.
pub fn sort_products<P: Borrow<Product>>(products: &mut [P], order: PriceSort) {
    match order {
        PriceSort::Default => {}
        PriceSort::LowToHigh => products.sort_by_key(|p| p.borrow().price),
        PriceSort::HighToLow => {
            products.sort_by(|a, b| b.borrow().price.cmp(&a.borrow().price));
        }
    }
}
