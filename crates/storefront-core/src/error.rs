//! Error types for storefront core rules.

use crate::ids::IdError;
use crate::order::OrderStatus;

/// Result type for storefront core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by validation and pure computations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A price was negative.
    #[error("invalid price for {product_id}: {price}")]
    InvalidPrice {
        /// The offending product.
        product_id: String,
        /// The rejected price.
        price: i64,
    },

    /// A line quantity was below 1.
    #[error("invalid quantity for {product_id}: {quantity}")]
    InvalidQuantity {
        /// The offending product.
        product_id: String,
        /// The rejected quantity.
        quantity: u32,
    },

    /// A required field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A total did not fit in an `i64`.
    #[error("amount overflow while computing {0}")]
    AmountOverflow(&'static str),

    /// An order status change that the lifecycle does not allow.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
