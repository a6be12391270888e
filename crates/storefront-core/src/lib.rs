//! Core types and rules for the storefront.
//!
//! This crate holds everything that does not touch the document store:
//!
//! - **Identifiers**: `UserId`, `ProductId`, `OrderId`
//! - **Catalog**: `Product`, keyword search, category filter, price sort
//! - **Cart**: `Cart`, `CartLineItem` and the line-item merge rules
//! - **Orders**: `Order`, `OrderDraft`, `OrderStatus` and its transition table
//! - **Pricing**: `ShippingFeeTable`, `OrderSummary`, `compute_summary`
//! - **Tracking**: `derive_timeline`, `status_display`
//!
//! # Amounts
//!
//! Prices are `i64` amounts in the smallest displayed currency unit. No
//! decimal handling is performed; every total is integer arithmetic with
//! overflow checks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cart;
pub mod catalog;
pub mod error;
pub mod ids;
pub mod order;
pub mod pricing;
pub mod product;
pub mod timeline;

pub use cart::{Cart, CartLineItem};
pub use catalog::{filter_by_category, search, sort_products, PriceSort};
pub use error::{CoreError, Result};
pub use ids::{IdError, OrderId, ProductId, UserId};
pub use order::{
    sort_newest_first, Order, OrderDraft, OrderLineSnapshot, OrderStatus, PaymentMethod,
    ShippingMethod, UserOrderIndexEntry, TRANSITIONS,
};
pub use pricing::{
    compute_summary, OrderSummary, ShippingFeeTable, EXPRESS_SHIPPING_FEE, STANDARD_SHIPPING_FEE,
};
pub use product::Product;
pub use timeline::{derive_timeline, status_display, Milestone, StatusDisplay, TimelineEvent};
