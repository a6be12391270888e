//! Live product catalog.
//!
//! Products live as an object map at `products`, one child per product id.
//! The service keeps a decoded copy and answers search, category and sort
//! queries against it with the pure functions from `storefront_core`.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use storefront_core::{catalog, PriceSort, Product, ProductId};
use storefront_store::{DocPath, DocumentStore, Subscription};
use tokio::sync::watch;

use crate::error::Result;

/// Decode an object map of products keyed by product id.
///
/// A child without an `id` takes its key. Children that do not decode or
/// fail validation are skipped with a warning.
pub(crate) fn products_from_document(path: &DocPath, value: Option<Value>) -> Vec<Product> {
    let map = match value {
        Some(Value::Object(map)) => map,
        None => return Vec::new(),
        Some(_) => {
            tracing::warn!(path = %path, "expected an object of products, ignoring");
            return Vec::new();
        }
    };

    map.into_iter()
        .filter_map(|(key, mut child)| {
            if let Value::Object(fields) = &mut child {
                fields.entry("id").or_insert_with(|| Value::String(key.clone()));
            }
            let product = serde_json::from_value::<Product>(child)
                .map_err(|e| e.to_string())
                .and_then(|p| p.validate().map(|()| p).map_err(|e| e.to_string()));
            match product {
                Ok(product) => Some(product),
                Err(error) => {
                    tracing::warn!(path = %path, key = %key, error = %error, "skipping product");
                    None
                }
            }
        })
        .collect()
}

/// Live view of the product catalog.
pub struct CatalogService {
    products: Arc<watch::Sender<Vec<Product>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl CatalogService {
    /// Subscribe to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Store` if the subscription fails.
    pub fn create(store: &dyn DocumentStore) -> Result<Self> {
        let products = Arc::new(watch::channel(Vec::new()).0);
        let path = DocPath::products();

        let sink = Arc::clone(&products);
        let source = path.clone();
        let subscription = store.subscribe(
            &path,
            Arc::new(move |value: Option<Value>| {
                let decoded = products_from_document(&source, value);
                tracing::debug!(count = decoded.len(), "catalog updated");
                sink.send_replace(decoded);
            }),
        )?;

        Ok(Self {
            products,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// All products, in key order.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.products.borrow().clone()
    }

    /// Receiver of catalog snapshots.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Vec<Product>> {
        self.products.subscribe()
    }

    /// Look up one product.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<Product> {
        self.products.borrow().iter().find(|p| &p.id == id).cloned()
    }

    /// Case-insensitive keyword search over name, category and brand.
    #[must_use]
    pub fn search(&self, keyword: &str) -> Vec<Product> {
        catalog::search(&self.products.borrow(), keyword)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Products in `category`, sorted by `order`.
    #[must_use]
    pub fn browse(&self, category: &str, order: PriceSort) -> Vec<Product> {
        let mut found: Vec<Product> = catalog::filter_by_category(&self.products.borrow(), category)
            .into_iter()
            .cloned()
            .collect();
        catalog::sort_products(&mut found, order);
        found
    }

    /// Stop following the catalog.
    pub fn dispose(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }
}
