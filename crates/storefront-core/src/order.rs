//! Order types and the order lifecycle.
//!
//! An order is written once at checkout with status `pending`. From then on
//! only its status (and the lifecycle timestamps that go with it) change,
//! and those changes come from an operator outside this workspace. The
//! transition table still lives here so every party agrees on it.
//!
//! ```text
//! pending -> processing -> shipped -> delivered
//!    |           |
//!    +-----------+--> cancelled
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartLineItem};
use crate::error::{CoreError, Result};
use crate::ids::{OrderId, ProductId, UserId};
use crate::pricing::OrderSummary;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, waiting for the shop to confirm.
    Pending,
    /// Confirmed and being prepared.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Cancelled before shipping.
    Cancelled,
}

/// Every legal `(from, to)` status change.
pub const TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Processing),
    (OrderStatus::Processing, OrderStatus::Shipped),
    (OrderStatus::Shipped, OrderStatus::Delivered),
    (OrderStatus::Pending, OrderStatus::Cancelled),
    (OrderStatus::Processing, OrderStatus::Cancelled),
];

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The wire name of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether `self -> to` appears in [`TRANSITIONS`].
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        TRANSITIONS.contains(&(self, to))
    }

    /// The statuses reachable in one step.
    #[must_use]
    pub fn allowed_next(self) -> Vec<Self> {
        TRANSITIONS
            .iter()
            .filter(|(from, _)| *from == self)
            .map(|(_, to)| *to)
            .collect()
    }

    /// Validate a status change.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` if the change is not in
    /// [`TRANSITIONS`].
    pub fn transition(self, to: Self) -> Result<Self> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CoreError::InvalidTransition { from: self, to })
        }
    }

    /// No further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// The next status on the forward path, if any.
    #[must_use]
    pub const fn next_forward(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Processing),
            Self::Processing => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered | Self::Cancelled => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Checkout choices
// ============================================================================

/// Delivery option picked at checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    /// 3-5 day delivery.
    #[default]
    Standard,
    /// 1-2 day delivery.
    Express,
}

/// Payment option picked at checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    Cod,
    /// First supported e-wallet.
    WalletA,
    /// Second supported e-wallet.
    WalletB,
}

// ============================================================================
// Draft
// ============================================================================

/// A checkout in progress. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    /// The selected cart lines being ordered.
    pub items: Vec<CartLineItem>,
    /// Delivery option.
    pub shipping_method: ShippingMethod,
    /// Payment option.
    pub payment_method: PaymentMethod,
    /// Free-form note for the shop.
    pub note: String,
    /// Discount code as typed. Recorded, not applied.
    pub discount_code: String,
}

impl OrderDraft {
    /// Draft from the selected items of `cart`.
    #[must_use]
    pub fn from_cart(
        cart: &Cart,
        shipping_method: ShippingMethod,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            items: cart.selected_items(),
            shipping_method,
            payment_method,
            note: String::new(),
            discount_code: String::new(),
        }
    }

    /// Set the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Set the discount code.
    #[must_use]
    pub fn with_discount_code(mut self, code: impl Into<String>) -> Self {
        self.discount_code = code.into();
        self
    }

    /// Product ids of the drafted lines, for clearing them from the cart
    /// once the order is placed.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.id().clone()).collect()
    }
}

// ============================================================================
// Persisted records
// ============================================================================

/// A line of an order, frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineSnapshot {
    /// Product id.
    pub id: ProductId,
    /// Product name at order time.
    pub name: String,
    /// Unit price at order time.
    pub price: i64,
    /// Units ordered.
    pub quantity: u32,
    /// Image URL at order time.
    #[serde(default)]
    pub image: String,
}

impl From<&CartLineItem> for OrderLineSnapshot {
    fn from(item: &CartLineItem) -> Self {
        Self {
            id: item.product.id.clone(),
            name: item.product.name.clone(),
            price: item.product.price,
            quantity: item.quantity,
            image: item.product.image.clone(),
        }
    }
}

/// The primary order record stored at `orders/{orderId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Generated order id.
    pub order_id: OrderId,
    /// Owner.
    pub user_id: UserId,
    /// Frozen order lines.
    #[serde(default)]
    pub items: Vec<OrderLineSnapshot>,
    /// Delivery option.
    pub shipping_method: ShippingMethod,
    /// Fee charged for the delivery option.
    pub shipping_fee: i64,
    /// Payment option.
    pub payment_method: PaymentMethod,
    /// Sum of line totals.
    pub subtotal: i64,
    /// `subtotal + shipping_fee`.
    pub total: i64,
    /// Customer note.
    #[serde(default)]
    pub note: String,
    /// Discount code as entered.
    #[serde(default)]
    pub discount_code: String,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,

    // Maintained by the operator side; absent until the matching step happens.
    /// When the shop confirmed the order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the order was handed to the carrier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    /// When the order was delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the order was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why the order was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    /// Carrier tracking number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    /// Free-form delivery estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<String>,
}

impl Order {
    /// Build a new `pending` order from a draft and its computed summary.
    #[must_use]
    pub fn from_draft(
        order_id: OrderId,
        user_id: UserId,
        draft: &OrderDraft,
        summary: OrderSummary,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            user_id,
            items: draft.items.iter().map(OrderLineSnapshot::from).collect(),
            shipping_method: draft.shipping_method,
            shipping_fee: summary.shipping_fee,
            payment_method: draft.payment_method,
            subtotal: summary.subtotal,
            total: summary.total,
            note: draft.note.clone(),
            discount_code: draft.discount_code.clone(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancel_reason: None,
            tracking_id: None,
            estimated_delivery: None,
        }
    }

    /// The denormalized per-user listing entry for this order.
    #[must_use]
    pub fn index_entry(&self) -> UserOrderIndexEntry {
        UserOrderIndexEntry {
            order_id: self.order_id,
            total: self.total,
            status: self.status,
            created_at: self.created_at,
            items: self.items.clone(),
        }
    }

    /// Apply a legal status change, stamping `updated_at` and the matching
    /// lifecycle timestamp.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` for an illegal change; the
    /// order is left untouched.
    pub fn apply_status(&mut self, to: OrderStatus, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.transition(to)?;
        self.updated_at = now;
        let stamp = match to {
            OrderStatus::Processing => &mut self.confirmed_at,
            OrderStatus::Shipped => &mut self.shipped_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            OrderStatus::Pending => return Ok(()),
        };
        *stamp = Some(now);
        Ok(())
    }
}

/// The listing entry stored at `users/{userId}/orders/{orderId}`.
///
/// A read optimization only; the primary [`Order`] wins on any disagreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOrderIndexEntry {
    /// Order id.
    pub order_id: OrderId,
    /// Order total.
    pub total: i64,
    /// Status at the time the entry was written.
    pub status: OrderStatus,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// Frozen order lines.
    #[serde(default)]
    pub items: Vec<OrderLineSnapshot>,
}

/// Sort orders newest first by `created_at`.
///
/// Timestamps compare as instants, never as strings. The sort is stable, so
/// orders placed at the same instant keep their relative order.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
