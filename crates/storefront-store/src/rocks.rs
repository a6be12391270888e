//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the
//! `DocumentStore` trait. Documents are flattened into one entry per leaf
//! (see [`crate::schema`]); every write, batched or not, is a single
//! `WriteBatch` and therefore atomic.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};
use crate::listeners::{lock, ListenerRegistry, Subscription, UpdateFn};
use crate::paths::DocPath;
use crate::schema::{all_column_families, cf, subtree_end, subtree_start};
use crate::{tree, DocumentStore};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    listeners: Arc<ListenerRegistry>,
    /// Serializes writes with the notification snapshots taken after them.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!(path = %path.as_ref().display(), "document store opened");

        Ok(Self {
            db: Arc::new(db),
            listeners: ListenerRegistry::new(),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize(value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize(data: &[u8]) -> Result<Value> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Reassemble the document at `path` from its leaves.
    fn read_sync(&self, path: &DocPath) -> Result<Option<Value>> {
        let cf = self.cf(cf::DOCUMENTS)?;

        if let Some(data) = self
            .db
            .get_cf(&cf, path.as_str())
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            return Self::deserialize(&data).map(Some);
        }

        let start = subtree_start(path.as_str());
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(start.as_bytes(), Direction::Forward));

        let mut root = Map::new();
        for item in iter {
            let (key, data) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let Some(relative) = key.strip_prefix(start.as_bytes()) else {
                break;
            };
            let relative = std::str::from_utf8(relative)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let leaf_path = DocPath::new(relative)?;
            tree::set(&mut root, &leaf_path, Self::deserialize(&data)?);
        }

        Ok((!root.is_empty()).then_some(Value::Object(root)))
    }

    /// Add the operations replacing the node at `path` with `value`.
    fn stage(&self, batch: &mut WriteBatch, path: &DocPath, value: Value) -> Result<()> {
        let cf = self.cf(cf::DOCUMENTS)?;

        // A leaf stored at an ancestor would shadow the new subtree.
        for ancestor in path.ancestors() {
            batch.delete_cf(&cf, ancestor);
        }
        batch.delete_cf(&cf, path.as_str());
        batch.delete_range_cf(
            &cf,
            subtree_start(path.as_str()),
            subtree_end(path.as_str()),
        );

        if let Some(value) = tree::normalize(value) {
            let mut leaves = Vec::new();
            flatten(path.as_str().to_string(), value, &mut leaves);
            for (key, leaf) in leaves {
                batch.put_cf(&cf, key, Self::serialize(&leaf)?);
            }
        }
        Ok(())
    }

    fn apply(&self, writes: Vec<(DocPath, Value)>) -> Result<()> {
        let paths: Vec<DocPath> = writes.iter().map(|(path, _)| path.clone()).collect();
        {
            let _guard = lock(&self.write_lock);

            let mut batch = WriteBatch::default();
            for (path, value) in writes {
                self.stage(&mut batch, &path, value)?;
            }
            self.db
                .write(batch)
                .map_err(|e| StoreError::Database(e.to_string()))?;

            self.listeners
                .enqueue_affected(&paths, |path| self.read_sync(path));
        }
        tracing::debug!(paths = ?paths, "documents written");
        self.listeners.flush();
        Ok(())
    }
}

/// Split a normalized value into `(key, leaf)` pairs. Objects are
/// descended; scalars and arrays are leaves.
fn flatten(key: String, value: Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (child, v) in map {
                flatten(format!("{key}/{child}"), v, out);
            }
        }
        leaf => out.push((key, leaf)),
    }
}

#[async_trait]
impl DocumentStore for RocksStore {
    fn subscribe(&self, path: &DocPath, on_update: UpdateFn) -> Result<Subscription> {
        let subscription = {
            let _guard = lock(&self.write_lock);
            let current = self.read_sync(path)?;
            self.listeners.register(path.clone(), on_update, current)
        };
        self.listeners.flush();
        Ok(subscription)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    async fn read(&self, path: &DocPath) -> Result<Option<Value>> {
        self.read_sync(path)
    }

    async fn write(&self, path: &DocPath, value: Value) -> Result<()> {
        self.apply(vec![(path.clone(), value)])
    }

    async fn write_batch(&self, writes: Vec<(DocPath, Value)>) -> Result<()> {
        self.apply(writes)
    }

    fn supports_atomic_batch(&self) -> bool {
        true
    }
}
