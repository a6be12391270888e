//! Cart aggregation.
//!
//! [`CartService`] owns the local copy of one user's cart, mirrors it with
//! the document at `users/{userId}/cart` and applies the line-item rules
//! from [`storefront_core::Cart`].
//!
//! # Synchronization
//!
//! Every remote update replaces the local cart wholesale; the last full
//! document written wins. Two devices editing the same cart therefore
//! clobber each other.
//!
//! While optimistic writes are queued, the store may echo an older cart this
//! service wrote itself. Remote updates that differ from the newest queued
//! cart are held back until that write has been attempted; the queued write
//! replaces the remote document anyway.
//!
//! # Write policy
//!
//! - [`WritePolicy::Optimistic`]: the mutation is visible at once and the
//!   new cart is handed to a background writer. Write failures are logged
//!   and the local state is kept.
//! - [`WritePolicy::Confirm`]: the new cart is written first and becomes
//!   visible only if the write succeeded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use storefront_core::{Cart, CartLineItem, Product, ProductId, UserId};
use storefront_store::{to_document, DocPath, DocumentStore, Subscription};
use tokio::sync::watch;

use crate::config::{StorefrontConfig, WritePolicy};
use crate::error::{Result, StorefrontError};
use crate::identity::IdentityProvider;
use crate::retry::RetryPolicy;
use crate::writer::{DocumentWriter, WriteProgress};

/// The signed-in part of a cart service.
struct Remote {
    user_id: UserId,
    path: DocPath,
    writer: Option<DocumentWriter>,
    echoes: Option<Arc<EchoFilter>>,
}

/// Newest cart handed to the writer, with its ticket.
struct EchoFilter {
    progress: WriteProgress,
    latest: Mutex<Option<(u64, Cart)>>,
}

impl EchoFilter {
    fn new(progress: WriteProgress) -> Self {
        Self {
            progress,
            latest: Mutex::new(None),
        }
    }

    fn record(&self, ticket: u64, cart: &Cart) {
        *lock(&self.latest) = Some((ticket, cart.clone()));
    }

    /// Whether `remote` must wait for the newest queued write.
    fn holds_back(&self, remote: &Cart) -> bool {
        match &*lock(&self.latest) {
            Some((ticket, latest)) if !self.progress.reached(*ticket) => remote != latest,
            _ => false,
        }
    }
}

/// Live, persisted cart of the current user.
pub struct CartService {
    store: Arc<dyn DocumentStore>,
    policy: WritePolicy,
    retry: RetryPolicy,
    state: Arc<watch::Sender<Cart>>,
    remote: Option<Remote>,
    subscription: Mutex<Option<Subscription>>,
    /// Serializes confirm-mode mutations.
    confirm_lock: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CartService {
    /// Load the cart of the current user and follow remote changes.
    ///
    /// Anonymous users get an empty, local-only cart whose mutators do
    /// nothing.
    ///
    /// # Errors
    ///
    /// - `StorefrontError::NoRuntime` if the write policy is optimistic and
    ///   no tokio runtime is running.
    /// - `StorefrontError::Store` if the subscription fails.
    pub fn create(
        store: Arc<dyn DocumentStore>,
        identity: &dyn IdentityProvider,
        config: &StorefrontConfig,
    ) -> Result<Self> {
        let state = Arc::new(watch::channel(Cart::new()).0);

        let Some(user_id) = identity.current_user_id() else {
            tracing::debug!("no signed-in user, cart is local only");
            return Ok(Self {
                store,
                policy: config.write_policy,
                retry: config.retry,
                state,
                remote: None,
                subscription: Mutex::new(None),
                confirm_lock: tokio::sync::Mutex::new(()),
            });
        };

        let writer = match config.write_policy {
            WritePolicy::Optimistic => {
                Some(DocumentWriter::spawn(Arc::clone(&store), config.retry)?)
            }
            WritePolicy::Confirm => None,
        };
        let echoes = writer
            .as_ref()
            .map(|writer| Arc::new(EchoFilter::new(writer.progress())));

        let path = DocPath::cart(&user_id);
        let subscription = store.subscribe(
            &path,
            remote_update_handler(&state, &path, echoes.clone()),
        )?;

        tracing::info!(
            user_id = %user_id,
            policy = ?config.write_policy,
            items = state.borrow().len(),
            "cart loaded"
        );

        Ok(Self {
            store,
            policy: config.write_policy,
            retry: config.retry,
            state,
            remote: Some(Remote {
                user_id,
                path,
                writer,
                echoes,
            }),
            subscription: Mutex::new(Some(subscription)),
            confirm_lock: tokio::sync::Mutex::new(()),
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`: a new line item, or one more unit of the
    /// existing one.
    ///
    /// # Errors
    ///
    /// - `StorefrontError::Validation` if the product is malformed.
    /// - `StorefrontError::StoreWrite` in confirm mode if the write failed.
    pub async fn add_item(&self, product: &Product) -> Result<()> {
        product.validate()?;
        self.mutate("add_item", |cart| cart.add_item(product)).await
    }

    /// Set the quantity of a line item, clamped to at least 1.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::StoreWrite` in confirm mode if the write
    /// failed.
    pub async fn update_quantity(&self, id: &ProductId, quantity: i64) -> Result<()> {
        self.mutate("update_quantity", |cart| cart.update_quantity(id, quantity))
            .await
    }

    /// Remove a line item.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::StoreWrite` in confirm mode if the write
    /// failed.
    pub async fn remove_item(&self, id: &ProductId) -> Result<()> {
        self.mutate("remove_item", |cart| cart.remove_item(id)).await
    }

    /// Remove several line items in one write, e.g. the ones just checked
    /// out.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::StoreWrite` in confirm mode if the write
    /// failed.
    pub async fn remove_items(&self, ids: &[ProductId]) -> Result<()> {
        self.mutate("remove_items", |cart| cart.remove_items(ids)).await
    }

    /// Flip whether a line item is selected for checkout.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::StoreWrite` in confirm mode if the write
    /// failed.
    pub async fn toggle_select(&self, id: &ProductId) -> Result<()> {
        self.mutate("toggle_select", |cart| cart.toggle_select(id)).await
    }

    async fn mutate<F>(&self, op: &'static str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Cart) -> bool,
    {
        let Some(remote) = &self.remote else {
            tracing::debug!(op, "ignoring cart mutation without a signed-in user");
            return Ok(());
        };

        match self.policy {
            WritePolicy::Optimistic => {
                self.mutate_optimistic(remote, op, apply);
                Ok(())
            }
            WritePolicy::Confirm => self.mutate_confirmed(remote, op, apply).await,
        }
    }

    fn mutate_optimistic<F>(&self, remote: &Remote, op: &'static str, apply: F)
    where
        F: FnOnce(&mut Cart) -> bool,
    {
        // Queue the write while the cart is still locked so writes keep
        // the order of the mutations.
        self.state.send_if_modified(|cart| {
            if !apply(cart) {
                tracing::debug!(op, user_id = %remote.user_id, "cart unchanged");
                return false;
            }
            match to_document(cart) {
                Ok(value) => {
                    let ticket = remote
                        .writer
                        .as_ref()
                        .and_then(|writer| writer.enqueue(remote.path.clone(), value));
                    match (ticket, &remote.echoes) {
                        (Some(ticket), Some(echoes)) => echoes.record(ticket, cart),
                        (Some(_), None) => {}
                        (None, _) => {
                            tracing::warn!(op, path = %remote.path, "cart writer stopped, change kept locally");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(op, path = %remote.path, error = %e, "cart could not be encoded");
                }
            }
            true
        });
    }

    async fn mutate_confirmed<F>(&self, remote: &Remote, op: &'static str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Cart) -> bool,
    {
        let _serial = self.confirm_lock.lock().await;

        let mut next = self.state.borrow().clone();
        if !apply(&mut next) {
            tracing::debug!(op, user_id = %remote.user_id, "cart unchanged");
            return Ok(());
        }

        let value = to_document(&next).map_err(|source| StorefrontError::StoreWrite {
            path: remote.path.to_string(),
            source,
        })?;
        self.retry
            .run(remote.path.as_str(), || self.store.write(&remote.path, value.clone()))
            .await
            .map_err(|source| {
                tracing::error!(op, path = %remote.path, error = %source, "cart write failed");
                StorefrontError::StoreWrite {
                    path: remote.path.to_string(),
                    source,
                }
            })?;

        self.state.send_if_modified(|cart| {
            if *cart == next {
                false
            } else {
                *cart = next;
                true
            }
        });
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The signed-in user this cart belongs to.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.remote.as_ref().map(|remote| &remote.user_id)
    }

    /// Current cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.state.borrow().clone()
    }

    /// Receiver of cart snapshots, updated on every local or remote change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Cart> {
        self.state.subscribe()
    }

    /// Line items selected for checkout.
    #[must_use]
    pub fn selected_items(&self) -> Vec<CartLineItem> {
        self.state.borrow().selected_items()
    }

    /// Sum of `price * quantity` over the selected items.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Validation` for a malformed line item or
    /// an overflowing total.
    pub fn selected_total(&self) -> Result<i64> {
        Ok(self.state.borrow().selected_total()?)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Wait until every optimistic write queued so far has been attempted.
    pub async fn flush(&self) {
        if let Some(writer) = self.remote.as_ref().and_then(|r| r.writer.as_ref()) {
            writer.flush().await;
        }
    }

    /// Stop following the remote cart and let queued writes finish.
    pub async fn dispose(mut self) {
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.unsubscribe();
        }
        if let Some(writer) = self.remote.as_mut().and_then(|r| r.writer.take()) {
            writer.close().await;
        }
        tracing::debug!(user_id = ?self.user_id(), "cart disposed");
    }
}

/// Replace the local cart with each remote update. Undecodable documents
/// are ignored, and so are stale echoes of this service's own writes.
fn remote_update_handler(
    state: &Arc<watch::Sender<Cart>>,
    path: &DocPath,
    echoes: Option<Arc<EchoFilter>>,
) -> storefront_store::UpdateFn {
    let state = Arc::clone(state);
    let path = path.clone();
    Arc::new(move |value: Option<Value>| {
        match Cart::from_document(value.unwrap_or(Value::Null)) {
            Ok(remote) => {
                state.send_if_modified(|cart| {
                    if *cart == remote {
                        return false;
                    }
                    if echoes.as_ref().is_some_and(|echoes| echoes.holds_back(&remote)) {
                        tracing::debug!(path = %path, "holding back remote cart until queued write lands");
                        return false;
                    }
                    tracing::debug!(path = %path, items = remote.len(), "remote cart replaced local state");
                    *cart = remote;
                    true
                });
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "ignoring undecodable cart document");
            }
        }
    })
}
