//! Per-user favorites.
//!
//! Favorites are product snapshots stored as an object map at
//! `favorites/{userId}`, one child per product id. Changes are applied
//! locally first and written in the background, like optimistic cart
//! mutations.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use storefront_core::{Product, ProductId, UserId};
use storefront_store::{to_document, DocPath, DocumentStore, Subscription};
use tokio::sync::watch;

use crate::catalog::products_from_document;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::identity::IdentityProvider;
use crate::writer::DocumentWriter;

type Favorites = BTreeMap<ProductId, Product>;

struct Remote {
    user_id: UserId,
    writer: Option<DocumentWriter>,
}

/// Live set of the current user's favorite products.
pub struct FavoritesService {
    state: Arc<watch::Sender<Favorites>>,
    remote: Option<Remote>,
    subscription: Mutex<Option<Subscription>>,
}

impl FavoritesService {
    /// Load the favorites of the current user and follow remote changes.
    ///
    /// Anonymous users get an empty set whose mutators do nothing.
    ///
    /// # Errors
    ///
    /// - `StorefrontError::NoRuntime` for a signed-in user when no tokio
    ///   runtime is running.
    /// - `StorefrontError::Store` if the subscription fails.
    pub fn create(
        store: Arc<dyn DocumentStore>,
        identity: &dyn IdentityProvider,
        config: &StorefrontConfig,
    ) -> Result<Self> {
        let state = Arc::new(watch::channel(Favorites::new()).0);

        let Some(user_id) = identity.current_user_id() else {
            tracing::debug!("no signed-in user, favorites are local only");
            return Ok(Self {
                state,
                remote: None,
                subscription: Mutex::new(None),
            });
        };

        let writer = DocumentWriter::spawn(Arc::clone(&store), config.retry)?;

        let path = DocPath::favorites(&user_id);
        let sink = Arc::clone(&state);
        let source = path.clone();
        let subscription = store.subscribe(
            &path,
            Arc::new(move |value: Option<Value>| {
                let remote: Favorites = products_from_document(&source, value)
                    .into_iter()
                    .map(|product| (product.id.clone(), product))
                    .collect();
                sink.send_if_modified(|current| {
                    if *current == remote {
                        false
                    } else {
                        *current = remote;
                        true
                    }
                });
            }),
        )?;

        tracing::info!(
            user_id = %user_id,
            count = state.borrow().len(),
            "favorites loaded"
        );

        Ok(Self {
            state,
            remote: Some(Remote {
                user_id,
                writer: Some(writer),
            }),
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// Mark `product` as a favorite. Does nothing if it already is one.
    pub fn add(&self, product: &Product) {
        self.update("add", |favorites, remote| {
            if favorites.contains_key(&product.id) {
                return false;
            }
            match to_document(product) {
                Ok(value) => {
                    favorites.insert(product.id.clone(), product.clone());
                    remote.write(&product.id, value);
                    true
                }
                Err(e) => {
                    tracing::error!(product_id = %product.id, error = %e, "favorite could not be encoded");
                    false
                }
            }
        });
    }

    /// Unmark a favorite.
    pub fn remove(&self, id: &ProductId) {
        self.update("remove", |favorites, remote| {
            if favorites.remove(id).is_none() {
                return false;
            }
            remote.write(id, Value::Null);
            true
        });
    }

    /// Add `product` if it is not a favorite, remove it otherwise. Returns
    /// whether it is a favorite afterwards.
    pub fn toggle(&self, product: &Product) -> bool {
        if self.is_favorite(&product.id) {
            self.remove(&product.id);
        } else {
            self.add(product);
        }
        self.is_favorite(&product.id)
    }

    fn update<F>(&self, op: &'static str, apply: F)
    where
        F: FnOnce(&mut Favorites, &Remote) -> bool,
    {
        let Some(remote) = &self.remote else {
            tracing::debug!(op, "ignoring favorites change without a signed-in user");
            return;
        };
        self.state.send_if_modified(|favorites| apply(favorites, remote));
    }

    /// Whether `id` is a favorite.
    #[must_use]
    pub fn is_favorite(&self, id: &ProductId) -> bool {
        self.state.borrow().contains_key(id)
    }

    /// Current favorites, ordered by product id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Product> {
        self.state.borrow().values().cloned().collect()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<BTreeMap<ProductId, Product>> {
        self.state.subscribe()
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        if let Some(writer) = self.remote.as_ref().and_then(|r| r.writer.as_ref()) {
            writer.flush().await;
        }
    }

    /// Stop following remote changes and let queued writes finish.
    pub async fn dispose(mut self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        if let Some(writer) = self.remote.as_mut().and_then(|r| r.writer.take()) {
            writer.close().await;
        }
    }
}

impl Remote {
    fn write(&self, id: &ProductId, value: Value) {
        let path = DocPath::favorite(&self.user_id, id);
        let queued = self
            .writer
            .as_ref()
            .is_some_and(|writer| writer.enqueue(path.clone(), value).is_some());
        if !queued {
            tracing::warn!(path = %path, "favorites writer stopped, change kept locally");
        }
    }
}
