//! Storefront services.
//!
//! This crate provides the stateful services of the storefront, built on a
//! [`storefront_store::DocumentStore`] and an [`IdentityProvider`]:
//!
//! - Cart aggregation ([`CartService`])
//! - Order placement ([`OrderBuilder`])
//! - Live order tracking ([`OrderTracker`])
//! - Favorites ([`FavoritesService`]) and the product catalog
//!   ([`CatalogService`])
//!
//! # Consistency
//!
//! There is no server-side validation. Every service trusts the document
//! store as the single source of truth and replaces its local state with
//! whatever the store reports. Cart and favorites changes are optimistic by
//! default; see [`WritePolicy`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // CartService in cart, OrderTracker in tracker

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod favorites;
pub mod identity;
pub mod retry;
pub mod telemetry;
pub mod tracker;
mod writer;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::OrderBuilder;
pub use config::{StorefrontConfig, WritePolicy};
pub use error::{Result, StorefrontError};
pub use favorites::FavoritesService;
pub use identity::{IdentityProvider, SessionIdentity, StaticIdentity};
pub use retry::RetryPolicy;
pub use telemetry::init_tracing;
pub use tracker::{OrderFeed, OrderTracker, OrderWatch};
