//! Live order tracking.
//!
//! An [`OrderFeed`] follows every order of one user. It learns the order
//! ids from the listing at `users/{userId}/orders`, follows each primary
//! record at `orders/{orderId}` and publishes the primaries newest first.
//! The listing entries only contribute ids; when they disagree with a
//! primary record, the primary wins. Orders whose primary record is absent
//! are left out.
//!
//! An [`OrderWatch`] follows a single primary record for the tracking
//! screen.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::Stream;
use serde_json::Value;
use storefront_core::{
    derive_timeline, sort_newest_first, Order, OrderId, TimelineEvent, UserId,
};
use storefront_store::{from_document, DocPath, DocumentStore, Subscription};
use tokio::sync::watch;

use crate::error::Result;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry point for order subscriptions.
pub struct OrderTracker {
    store: Arc<dyn DocumentStore>,
}

impl OrderTracker {
    /// Create a tracker over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Follow all orders of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Store` if the listing cannot be
    /// subscribed to.
    pub fn subscribe(&self, user_id: &UserId) -> Result<OrderFeed> {
        let shared = Arc::new(FeedShared {
            user_id: user_id.clone(),
            store: Arc::downgrade(&self.store),
            state: Mutex::new(FeedState::default()),
            orders: watch::channel(Vec::new()).0,
        });

        let weak = Arc::downgrade(&shared);
        let index = self.store.subscribe(
            &DocPath::user_orders(user_id),
            Arc::new(move |value: Option<Value>| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_index(value);
                }
            }),
        )?;
        lock(&shared.state).index = Some(index);

        let rx = shared.orders.subscribe();
        tracing::info!(
            user_id = %user_id,
            orders = rx.borrow().len(),
            "order feed started"
        );
        Ok(OrderFeed { shared, rx })
    }

    /// Follow the primary record of one order.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Store` if the order cannot be subscribed
    /// to.
    pub fn watch_order(&self, order_id: &OrderId) -> Result<OrderWatch> {
        let (sink, mut rx) = watch::channel(None);
        let path = DocPath::order(order_id);

        let source = path.clone();
        let subscription = self.store.subscribe(
            &path,
            Arc::new(move |value: Option<Value>| {
                if let Ok(order) = decode_order(&source, value) {
                    sink.send_replace(order);
                }
            }),
        )?;
        // The initial delivery is the starting point, not a change.
        drop(rx.borrow_and_update());

        Ok(OrderWatch {
            order_id: *order_id,
            rx,
            subscription: Some(subscription),
        })
    }
}

/// Decode a primary order record. `Err` means the update should be ignored.
fn decode_order(path: &DocPath, value: Option<Value>) -> std::result::Result<Option<Order>, ()> {
    let Some(value) = value else {
        return Ok(None);
    };
    from_document::<Order>(value).map(Some).map_err(|e| {
        tracing::warn!(path = %path, error = %e, "ignoring undecodable order");
    })
}

// ============================================================================
// Order feed
// ============================================================================

#[derive(Default)]
struct FeedState {
    closed: bool,
    /// Order ids currently in the listing.
    wanted: BTreeSet<OrderId>,
    /// Latest decoded primary record per order.
    primaries: BTreeMap<OrderId, Order>,
    index: Option<Subscription>,
    per_order: HashMap<OrderId, Subscription>,
}

struct FeedShared {
    user_id: UserId,
    /// Weak so the store's callbacks do not keep the store alive.
    store: Weak<dyn DocumentStore>,
    state: Mutex<FeedState>,
    orders: watch::Sender<Vec<Order>>,
}

impl FeedShared {
    fn on_index(self: &Arc<Self>, value: Option<Value>) {
        let ids = self.listed_ids(value);
        let Some(store) = self.store.upgrade() else {
            return;
        };

        let (stale, added) = {
            let mut state = lock(&self.state);
            if state.closed {
                return;
            }
            let removed: Vec<OrderId> = state.wanted.difference(&ids).copied().collect();
            let added: Vec<OrderId> = ids.difference(&state.wanted).copied().collect();
            state.wanted = ids;

            let mut stale = Vec::with_capacity(removed.len());
            for id in &removed {
                state.primaries.remove(id);
                stale.extend(state.per_order.remove(id));
            }
            if !removed.is_empty() {
                self.publish(&state);
            }
            (stale, added)
        };
        drop(stale);

        for order_id in added {
            let weak = Arc::downgrade(self);
            let path = DocPath::order(&order_id);
            let subscribed = store.subscribe(
                &path,
                Arc::new(move |value: Option<Value>| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_order(order_id, value);
                    }
                }),
            );
            match subscribed {
                Ok(subscription) => {
                    let stale = {
                        let mut state = lock(&self.state);
                        if state.closed || !state.wanted.contains(&order_id) {
                            Some(subscription)
                        } else {
                            state.per_order.insert(order_id, subscription)
                        }
                    };
                    drop(stale);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "cannot follow order");
                }
            }
        }
    }

    fn on_order(&self, order_id: OrderId, value: Option<Value>) {
        let Ok(order) = decode_order(&DocPath::order(&order_id), value) else {
            return;
        };
        let mut state = lock(&self.state);
        if state.closed || !state.wanted.contains(&order_id) {
            return;
        }
        match order {
            Some(order) => {
                state.primaries.insert(order_id, order);
            }
            None => {
                state.primaries.remove(&order_id);
            }
        }
        self.publish(&state);
    }

    /// Order ids named by the listing document.
    fn listed_ids(&self, value: Option<Value>) -> BTreeSet<OrderId> {
        match value {
            None => BTreeSet::new(),
            Some(Value::Object(entries)) => entries
                .keys()
                .filter_map(|key| match key.parse() {
                    Ok(id) => Some(id),
                    Err(e) => {
                        tracing::warn!(user_id = %self.user_id, key = %key, error = %e, "skipping listing entry");
                        None
                    }
                })
                .collect(),
            Some(_) => {
                tracing::warn!(user_id = %self.user_id, "order listing is not an object, ignoring");
                BTreeSet::new()
            }
        }
    }

    fn publish(&self, state: &FeedState) {
        let mut orders: Vec<Order> = state.primaries.values().cloned().collect();
        sort_newest_first(&mut orders);
        self.orders.send_if_modified(|current| {
            if *current == orders {
                false
            } else {
                *current = orders;
                true
            }
        });
    }

    fn close(&self) {
        let (index, per_order) = {
            let mut state = lock(&self.state);
            if state.closed {
                return;
            }
            state.closed = true;
            state.wanted.clear();
            state.primaries.clear();
            (state.index.take(), std::mem::take(&mut state.per_order))
        };
        drop(index);
        drop(per_order);
        tracing::debug!(user_id = %self.user_id, "order feed closed");
    }
}

/// Live, newest-first list of one user's orders.
///
/// Dropping the feed unsubscribes every listener it owns.
pub struct OrderFeed {
    shared: Arc<FeedShared>,
    rx: watch::Receiver<Vec<Order>>,
}

impl OrderFeed {
    /// The user whose orders are followed.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.shared.user_id
    }

    /// Current orders, newest first.
    #[must_use]
    pub fn current(&self) -> Vec<Order> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new list.
    pub async fn changed(&mut self) -> Vec<Order> {
        // The sender lives in `shared`, so this only fails once closed.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Receiver of order lists, for binding to a view.
    #[must_use]
    pub fn receiver(&self) -> watch::Receiver<Vec<Order>> {
        self.rx.clone()
    }

    /// The current list followed by every change.
    pub fn into_stream(self) -> impl Stream<Item = Vec<Order>> + Send {
        futures::stream::unfold((self, true), |(mut feed, first)| async move {
            let orders = if first {
                feed.rx.borrow_and_update().clone()
            } else {
                feed.changed().await
            };
            Some((orders, (feed, false)))
        })
    }

    /// Stop following the orders.
    pub fn unsubscribe(self) {
        self.shared.close();
    }
}

impl Drop for OrderFeed {
    fn drop(&mut self) {
        self.shared.close();
    }
}

// ============================================================================
// Single order
// ============================================================================

/// Live view of one primary order record.
pub struct OrderWatch {
    order_id: OrderId,
    rx: watch::Receiver<Option<Order>>,
    subscription: Option<Subscription>,
}

impl OrderWatch {
    /// The followed order id.
    #[must_use]
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// The order, `None` while absent.
    #[must_use]
    pub fn current(&self) -> Option<Order> {
        self.rx.borrow().clone()
    }

    /// Tracking timeline of the current order, empty while absent.
    #[must_use]
    pub fn timeline(&self) -> Vec<TimelineEvent> {
        self.rx.borrow().as_ref().map(derive_timeline).unwrap_or_default()
    }

    /// Wait for the next change and return the new value.
    pub async fn changed(&mut self) -> Option<Order> {
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Stop following the order.
    pub fn unsubscribe(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}
