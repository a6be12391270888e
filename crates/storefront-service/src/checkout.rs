//! Order placement.
//!
//! [`OrderBuilder`] turns an [`OrderDraft`] into a persisted [`Order`]:
//! the primary record at `orders/{orderId}` plus the listing entry at
//! `users/{userId}/orders/{orderId}`, committed together. The builder does
//! not touch the cart; removing checked-out items is the caller's job
//! (see `CartService::remove_items`).

use std::sync::Arc;

use chrono::Utc;
use storefront_core::{compute_summary, Order, OrderDraft, OrderId, OrderSummary, ShippingFeeTable};
use storefront_store::{DocPath, DocumentStore};

use crate::config::StorefrontConfig;
use crate::error::{Result, StorefrontError};
use crate::identity::IdentityProvider;
use crate::retry::RetryPolicy;

/// Places orders for the current user.
pub struct OrderBuilder {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    fees: ShippingFeeTable,
    retry: RetryPolicy,
}

impl OrderBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &StorefrontConfig,
    ) -> Self {
        if !store.supports_atomic_batch() {
            tracing::warn!(
                "document store cannot batch atomically - a failed commit may leave an order without its listing entry"
            );
        }
        Self {
            store,
            identity,
            fees: config.shipping_fees,
            retry: config.retry,
        }
    }

    /// Totals for `draft` with the configured shipping fees.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Validation` for a negative price, a zero
    /// quantity or an overflowing total.
    pub fn summarize(&self, draft: &OrderDraft) -> Result<OrderSummary> {
        Ok(compute_summary(&draft.items, draft.shipping_method, &self.fees)?)
    }

    /// Place an order for the current user.
    ///
    /// Writes nothing unless a user is signed in and the draft has items.
    /// The commit is retried per the configured policy.
    ///
    /// # Errors
    ///
    /// - `StorefrontError::NotAuthenticated` if nobody is signed in.
    /// - `StorefrontError::EmptyOrder` if the draft has no items.
    /// - `StorefrontError::Validation` if the totals cannot be computed.
    /// - `StorefrontError::StoreWrite` if the commit failed.
    pub async fn place_order(&self, draft: &OrderDraft) -> Result<OrderId> {
        let user_id = self
            .identity
            .current_user_id()
            .ok_or(StorefrontError::NotAuthenticated)?;

        if draft.items.is_empty() {
            tracing::debug!(user_id = %user_id, "refusing to place an empty order");
            return Err(StorefrontError::EmptyOrder);
        }

        let summary = self.summarize(draft)?;
        let order_id = OrderId::generate();
        let order = Order::from_draft(order_id, user_id.clone(), draft, summary, Utc::now());
        let entry = order.index_entry();

        self.retry
            .run("commit order", || self.store.commit_order(&order, &entry))
            .await
            .map_err(|source| {
                tracing::error!(
                    order_id = %order_id,
                    user_id = %user_id,
                    error = %source,
                    "order commit failed"
                );
                StorefrontError::StoreWrite {
                    path: DocPath::order(&order_id).to_string(),
                    source,
                }
            })?;

        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            items = order.items.len(),
            total = order.total,
            "order placed"
        );

        Ok(order_id)
    }
}
