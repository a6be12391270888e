//! In-memory document store.
//!
//! Holds the whole document tree in one map behind a mutex. Batches are
//! applied under a single lock acquisition, so they are atomic with respect
//! to readers and subscribers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::listeners::{lock, ListenerRegistry, Subscription, UpdateFn};
use crate::paths::DocPath;
use crate::{tree, DocumentStore};

/// In-process implementation of [`DocumentStore`].
pub struct MemoryStore {
    root: Mutex<Map<String, Value>>,
    listeners: Arc<ListenerRegistry>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Map::new()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// A store pre-populated with `root`. Non-object values give an empty
    /// store.
    #[must_use]
    pub fn with_data(root: Value) -> Self {
        let root = match tree::normalize(root) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            root: Mutex::new(root),
            listeners: ListenerRegistry::new(),
        }
    }

    /// The whole tree, for inspection.
    #[must_use]
    pub fn dump(&self) -> Value {
        Value::Object(lock(&self.root).clone())
    }

    fn apply(&self, writes: Vec<(DocPath, Value)>) {
        let paths: Vec<DocPath> = writes.iter().map(|(path, _)| path.clone()).collect();
        {
            let mut root = lock(&self.root);
            for (path, value) in writes {
                tree::set(&mut root, &path, value);
            }
            self.listeners
                .enqueue_affected(&paths, |path| Ok(tree::get(&root, path)));
        }
        tracing::trace!(paths = ?paths, "documents written");
        self.listeners.flush();
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn subscribe(&self, path: &DocPath, on_update: UpdateFn) -> Result<Subscription> {
        let subscription = {
            let root = lock(&self.root);
            self.listeners
                .register(path.clone(), on_update, tree::get(&root, path))
        };
        self.listeners.flush();
        Ok(subscription)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    async fn read(&self, path: &DocPath) -> Result<Option<Value>> {
        Ok(tree::get(&lock(&self.root), path))
    }

    async fn write(&self, path: &DocPath, value: Value) -> Result<()> {
        self.apply(vec![(path.clone(), value)]);
        Ok(())
    }

    async fn write_batch(&self, writes: Vec<(DocPath, Value)>) -> Result<()> {
        self.apply(writes);
        Ok(())
    }

    fn supports_atomic_batch(&self) -> bool {
        true
    }
}
