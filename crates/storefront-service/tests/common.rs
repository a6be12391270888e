//! Common test utilities for storefront integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use storefront_core::{Product, ProductId, UserId};
use storefront_service::{RetryPolicy, StaticIdentity, StorefrontConfig, WritePolicy};
use storefront_store::{
    DocPath, DocumentStore, MemoryStore, Result as StoreResult, StoreError, Subscription, UpdateFn,
};

/// A memory store that counts writes and can be told to fail or delay them.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
    writes: AtomicUsize,
}

impl FaultyStore {
    /// Make every following single-document write take `delay` before it
    /// lands.
    pub fn delay_writes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Make every following write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write calls seen so far, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The whole document tree.
    pub fn dump(&self) -> Value {
        self.inner.dump()
    }

    fn check(&self) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    fn subscribe(&self, path: &DocPath, on_update: UpdateFn) -> StoreResult<Subscription> {
        self.inner.subscribe(path, on_update)
    }

    fn listener_count(&self) -> usize {
        self.inner.listener_count()
    }

    async fn read(&self, path: &DocPath) -> StoreResult<Option<Value>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &DocPath, value: Value) -> StoreResult<()> {
        self.check()?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.write(path, value).await
    }

    async fn write_batch(&self, writes: Vec<(DocPath, Value)>) -> StoreResult<()> {
        self.check()?;
        self.inner.write_batch(writes).await
    }

    fn supports_atomic_batch(&self) -> bool {
        true
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The store, kept concrete for fault injection.
    pub store: Arc<FaultyStore>,
    /// The signed-in test user.
    pub user_id: UserId,
    /// Configuration with retries disabled so failures surface at once.
    pub config: StorefrontConfig,
}

impl TestHarness {
    /// Create a new harness with an empty store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(FaultyStore::default()),
            user_id: UserId::new("user-1").expect("valid user id"),
            config: StorefrontConfig {
                retry: RetryPolicy::no_retry(),
                ..StorefrontConfig::default()
            },
        }
    }

    /// Same harness, confirm-mode writes.
    pub fn confirming() -> Self {
        let mut harness = Self::new();
        harness.config.write_policy = WritePolicy::Confirm;
        harness
    }

    /// The store as the services see it.
    pub fn dyn_store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// Identity of the test user.
    pub fn identity(&self) -> StaticIdentity {
        StaticIdentity::user(self.user_id.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn product(id: &str, name: &str, price: i64) -> Product {
    Product::new(
        ProductId::new(id).expect("valid product id"),
        name,
        price,
        format!("https://img.example/{id}.png"),
    )
}

pub fn lamp() -> Product {
    product("lamp", "Desk Lamp", 120_000).with_category("Lighting")
}

pub fn mug() -> Product {
    product("mug", "Mug", 15_000).with_category("Kitchen")
}

pub fn kettle() -> Product {
    product("kettle", "Kettle", 45_000).with_category("Kitchen")
}
