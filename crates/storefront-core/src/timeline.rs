//! Display-side derivations from an order's status: the tracking timeline
//! and the per-status label/color/icon table.
//!
//! Nothing here is persisted. The timeline is recomputed from the order on
//! every render.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::order::{Order, OrderStatus};

/// A milestone in an order's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    /// The order was placed.
    Placed,
    /// The shop confirmed the order.
    Confirmed,
    /// The carrier has the order.
    Shipped,
    /// The customer received the order.
    Delivered,
    /// The order was cancelled.
    Cancelled,
}

impl Milestone {
    /// Short stable name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// The milestone reached by entering `status`.
    #[must_use]
    pub const fn reached_by(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => Self::Placed,
            OrderStatus::Processing => Self::Confirmed,
            OrderStatus::Shipped => Self::Shipped,
            OrderStatus::Delivered => Self::Delivered,
            OrderStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// One row of the tracking timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    /// Which milestone the row is about.
    pub milestone: Milestone,
    /// `true` for the synthetic "next expected" row.
    pub upcoming: bool,
    /// `true` for rows rendered as a failure (cancellation).
    pub is_error: bool,
    /// Row title.
    pub title: String,
    /// Row description.
    pub description: String,
    /// When the milestone happened, if known.
    pub at: Option<DateTime<Utc>>,
}

impl TimelineEvent {
    fn reached(milestone: Milestone, description: String, at: Option<DateTime<Utc>>) -> Self {
        let title = match milestone {
            Milestone::Placed => "Order placed",
            Milestone::Confirmed => "Order confirmed",
            Milestone::Shipped => "Order shipped",
            Milestone::Delivered => "Order delivered",
            Milestone::Cancelled => "Order cancelled",
        };
        Self {
            milestone,
            upcoming: false,
            is_error: milestone == Milestone::Cancelled,
            title: title.to_string(),
            description,
            at,
        }
    }

    fn upcoming(milestone: Milestone, estimated_delivery: Option<&str>) -> Self {
        let (title, description) = match milestone {
            Milestone::Confirmed => (
                "Awaiting confirmation",
                "We will let you know once the shop confirms your order".to_string(),
            ),
            Milestone::Shipped => (
                "Awaiting shipment",
                "We will let you know once your order ships".to_string(),
            ),
            _ => (
                "Delivery expected",
                match estimated_delivery {
                    Some(estimate) => format!("Estimated delivery: {estimate}"),
                    None => "We will let you know once your order is delivered".to_string(),
                },
            ),
        };
        Self {
            milestone,
            upcoming: true,
            is_error: false,
            title: title.to_string(),
            description,
            at: None,
        }
    }

    /// Stable key for the row: the milestone name, or `"upcoming"`.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        if self.upcoming {
            "upcoming"
        } else {
            self.milestone.as_str()
        }
    }
}

/// Derive the tracking timeline of `order` from its status.
///
/// - `placed` is always present, at `created_at`.
/// - `confirmed` unless the status is `pending` or `cancelled`.
/// - `shipped` when `shipped` or `delivered`.
/// - `delivered` when `delivered`.
/// - `cancelled` when `cancelled`, instead of any forward milestone.
/// - One upcoming row for the next expected milestone unless the order is
///   `delivered` or `cancelled`.
#[must_use]
pub fn derive_timeline(order: &Order) -> Vec<TimelineEvent> {
    let status = order.status;
    let mut events = vec![TimelineEvent::reached(
        Milestone::Placed,
        "Your order was placed successfully".to_string(),
        Some(order.created_at),
    )];

    if !matches!(status, OrderStatus::Pending | OrderStatus::Cancelled) {
        events.push(TimelineEvent::reached(
            Milestone::Confirmed,
            "Your order was confirmed and is being prepared".to_string(),
            order.confirmed_at,
        ));
    }

    if matches!(status, OrderStatus::Shipped | OrderStatus::Delivered) {
        let description = match &order.tracking_id {
            Some(tracking) => format!("Order #{tracking} was handed to the carrier"),
            None => "Your order was handed to the carrier".to_string(),
        };
        events.push(TimelineEvent::reached(
            Milestone::Shipped,
            description,
            order.shipped_at,
        ));
    }

    if status == OrderStatus::Delivered {
        events.push(TimelineEvent::reached(
            Milestone::Delivered,
            "Your order was delivered successfully".to_string(),
            order.delivered_at,
        ));
    }

    if status == OrderStatus::Cancelled {
        let description = order
            .cancel_reason
            .clone()
            .unwrap_or_else(|| "Your order was cancelled".to_string());
        events.push(TimelineEvent::reached(
            Milestone::Cancelled,
            description,
            order.cancelled_at,
        ));
    }

    if let Some(next) = status.next_forward() {
        events.push(TimelineEvent::upcoming(
            Milestone::reached_by(next),
            order.estimated_delivery.as_deref(),
        ));
    }

    events
}

/// Label, color and icon for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    /// Short label.
    pub label: &'static str,
    /// One-line explanation.
    pub description: &'static str,
    /// Badge color as `#rrggbb`.
    pub color: &'static str,
    /// Icon name from the app's icon set.
    pub icon: &'static str,
}

/// Display lookup for `status`.
#[must_use]
pub const fn status_display(status: OrderStatus) -> StatusDisplay {
    match status {
        OrderStatus::Pending => StatusDisplay {
            label: "Awaiting confirmation",
            description: "Your order is waiting for the shop to confirm it",
            color: "#f39c12",
            icon: "time-outline",
        },
        OrderStatus::Processing => StatusDisplay {
            label: "Processing",
            description: "Your order is being prepared",
            color: "#3498db",
            icon: "construct-outline",
        },
        OrderStatus::Shipped => StatusDisplay {
            label: "Shipping",
            description: "Your order is on its way",
            color: "#2ecc71",
            icon: "car-outline",
        },
        OrderStatus::Delivered => StatusDisplay {
            label: "Delivered",
            description: "Your order was delivered successfully",
            color: "#27ae60",
            icon: "checkmark-circle-outline",
        },
        OrderStatus::Cancelled => StatusDisplay {
            label: "Cancelled",
            description: "Your order was cancelled",
            color: "#e74c3c",
            icon: "close-circle-outline",
        },
    }
}
