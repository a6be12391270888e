//! Checkout pricing.
//!
//! The fee table is the only place shipping fees are defined; everything
//! else looks fees up through [`ShippingFeeTable::fee`].

use serde::{Deserialize, Serialize};

use crate::cart::CartLineItem;
use crate::error::{CoreError, Result};
use crate::order::ShippingMethod;

// ============================================================================
// Constants
// ============================================================================

/// Default standard shipping fee.
pub const STANDARD_SHIPPING_FEE: i64 = 30_000;

/// Default express shipping fee.
pub const EXPRESS_SHIPPING_FEE: i64 = 60_000;

/// Shipping fee per delivery option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingFeeTable {
    /// Fee for [`ShippingMethod::Standard`].
    pub standard: i64,
    /// Fee for [`ShippingMethod::Express`].
    pub express: i64,
}

impl Default for ShippingFeeTable {
    fn default() -> Self {
        Self {
            standard: STANDARD_SHIPPING_FEE,
            express: EXPRESS_SHIPPING_FEE,
        }
    }
}

impl ShippingFeeTable {
    /// Fee for `method`.
    #[must_use]
    pub const fn fee(&self, method: ShippingMethod) -> i64 {
        match method {
            ShippingMethod::Standard => self.standard,
            ShippingMethod::Express => self.express,
        }
    }
}

/// Totals shown on the checkout screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Sum of `price * quantity` over the items.
    pub subtotal: i64,
    /// Looked-up shipping fee.
    pub shipping_fee: i64,
    /// `subtotal + shipping_fee`.
    pub total: i64,
}

/// Compute subtotal, shipping fee and total for `items`.
///
/// An empty item list is valid and costs the shipping fee alone.
///
/// # Errors
///
/// - `CoreError::InvalidPrice` for a negative item price or shipping fee.
/// - `CoreError::InvalidQuantity` for a zero quantity.
/// - `CoreError::AmountOverflow` if a sum does not fit in `i64`.
pub fn compute_summary(
    items: &[CartLineItem],
    shipping_method: ShippingMethod,
    fees: &ShippingFeeTable,
) -> Result<OrderSummary> {
    let subtotal = items.iter().try_fold(0i64, |acc, item| {
        acc.checked_add(item.line_total()?)
            .ok_or(CoreError::AmountOverflow("subtotal"))
    })?;

    let shipping_fee = fees.fee(shipping_method);
    if shipping_fee < 0 {
        return Err(CoreError::InvalidPrice {
            product_id: format!("shipping:{shipping_method:?}"),
            price: shipping_fee,
        });
    }

    let total = subtotal
        .checked_add(shipping_fee)
        .ok_or(CoreError::AmountOverflow("total"))?;

    Ok(OrderSummary {
        subtotal,
        shipping_fee,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ProductId;
    use crate::product::Product;

    fn line(id: &str, price: i64, quantity: u32) -> CartLineItem {
        let mut item = CartLineItem::new(Product::new(ProductId::new(id).unwrap(), id, price, ""));
        item.quantity = quantity;
        item
    }

    #[test]
    fn empty_standard_costs_shipping_only() {
        let summary = compute_summary(&[], ShippingMethod::Standard, &ShippingFeeTable::default())
            .unwrap();
        assert_eq!(summary.subtotal, 0);
        assert_eq!(summary.shipping_fee, 30_000);
        assert_eq!(summary.total, 30_000);
    }

    #[test]
    fn express_two_units() {
        let items = [line("a", 100_000, 2)];
        let summary =
            compute_summary(&items, ShippingMethod::Express, &ShippingFeeTable::default()).unwrap();
        assert_eq!(summary.subtotal, 200_000);
        assert_eq!(summary.shipping_fee, 60_000);
        assert_eq!(summary.total, 260_000);
    }

    #[test]
    fn custom_fee_table() {
        let fees = ShippingFeeTable {
            standard: 0,
            express: 15_000,
        };
        let items = [line("a", 10, 3), line("b", 5, 1)];
        let summary = compute_summary(&items, ShippingMethod::Standard, &fees).unwrap();
        assert_eq!(summary.total, 35);
        assert_eq!(fees.fee(ShippingMethod::Express), 15_000);
    }

    #[test]
    fn negative_price_fails_fast() {
        let items = [line("a", 10, 1), line("b", -10, 1)];
        let err = compute_summary(&items, ShippingMethod::Standard, &ShippingFeeTable::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPrice { product_id, .. } if product_id == "b"));
    }

    #[test]
    fn negative_fee_fails_fast() {
        let fees = ShippingFeeTable {
            standard: -1,
            express: 0,
        };
        assert!(compute_summary(&[], ShippingMethod::Standard, &fees).is_err());
    }

    #[test]
    fn overflow_is_reported() {
        let items = [line("a", i64::MAX, 1)];
        let err = compute_summary(&items, ShippingMethod::Express, &ShippingFeeTable::default())
            .unwrap_err();
        assert_eq!(err, CoreError::AmountOverflow("total"));
    }
}
