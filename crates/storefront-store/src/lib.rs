//! Document storage layer for the storefront.
//!
//! The storefront keeps all of its state in a hierarchical JSON document
//! store: carts, orders, the per-user order listing, favorites and the
//! product catalog each live under a well-known [`DocPath`]. This crate
//! defines the [`DocumentStore`] trait the services program against, plus
//! two backends:
//!
//! - [`MemoryStore`]: in-process tree, used by tests and embedders
//! - `RocksStore` (feature `rocksdb-backend`): persistent `RocksDB` storage
//!
//! # Semantics
//!
//! - A write replaces the whole node at its path. Writing `null` deletes it.
//! - Subscribers receive the current value immediately and then the new
//!   value after every write at, above or below their path, in commit order.
//! - Callbacks never run while the store holds a lock, so they may call
//!   back into the store.
//!
//! # Example
//!
//! ```
//! use storefront_store::{DocPath, DocumentStore, MemoryStore};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let store = MemoryStore::new();
//! let path = DocPath::new("products/p1").unwrap();
//!
//! store.write(&path, serde_json::json!({"name": "Lamp"})).await.unwrap();
//! let value = store.read(&path).await.unwrap();
//! assert_eq!(value.unwrap()["name"], "Lamp");
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod listeners;
pub mod memory;
pub mod paths;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;
pub mod tree;

pub use error::{Result, StoreError};
pub use listeners::{Subscription, UpdateFn};
pub use memory::MemoryStore;
pub use paths::DocPath;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use serde_json::Value;
use storefront_core::{Order, UserOrderIndexEntry};

/// The storage trait the storefront services are written against.
///
/// This trait abstracts the document store, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing, or a remote
/// realtime database behind an adapter).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Watch the value at `path`.
    ///
    /// `on_update` is invoked with the current value before this returns,
    /// then after every write at, above or below `path`.
    /// `None` means the path holds nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the current value cannot be read.
    fn subscribe(&self, path: &DocPath, on_update: UpdateFn) -> Result<Subscription>;

    /// Number of live subscriptions. Used to verify that owners release
    /// what they subscribe to.
    fn listener_count(&self) -> usize;

    // =========================================================================
    // Reads and Writes
    // =========================================================================

    /// Read the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn read(&self, path: &DocPath) -> Result<Option<Value>>;

    /// Overwrite the node at `path` with `value`. `Value::Null` deletes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    async fn write(&self, path: &DocPath, value: Value) -> Result<()>;

    /// Apply several writes in order.
    ///
    /// The default implementation issues them one at a time, so a failure
    /// part-way leaves the earlier writes applied. Backends that can commit
    /// all writes atomically override this and
    /// [`supports_atomic_batch`](Self::supports_atomic_batch).
    ///
    /// # Errors
    ///
    /// Returns the first write error.
    async fn write_batch(&self, writes: Vec<(DocPath, Value)>) -> Result<()> {
        for (path, value) in writes {
            self.write(&path, value).await?;
        }
        Ok(())
    }

    /// Whether [`write_batch`](Self::write_batch) is all-or-nothing.
    fn supports_atomic_batch(&self) -> bool {
        false
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Persist a newly placed order: the primary record at
    /// `orders/{orderId}` and the listing entry at
    /// `users/{userId}/orders/{orderId}`, as one batch.
    ///
    /// # Errors
    ///
    /// - `StoreError::Serialization` if the order cannot be encoded.
    /// - Any error from [`write_batch`](Self::write_batch).
    async fn commit_order(&self, order: &Order, entry: &UserOrderIndexEntry) -> Result<()> {
        let order_value = to_document(order)?;
        let entry_value = to_document(entry)?;
        self.write_batch(vec![
            (DocPath::order(&order.order_id), order_value),
            (DocPath::user_order(&order.user_id, &order.order_id), entry_value),
        ])
        .await
    }
}

/// Encode a value as a JSON document.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if `value` cannot be represented.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a JSON document.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the document has the wrong shape.
pub fn from_document<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}
