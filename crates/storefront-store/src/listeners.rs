//! Subscription bookkeeping shared by the store backends.
//!
//! Backends register callbacks here and, while still holding their write
//! lock, queue one delivery per listener whose path overlaps the written
//! paths. Once the lock is released they call [`ListenerRegistry::flush`],
//! which runs the callbacks in queue order. Because queueing happens under
//! the write lock, every listener observes writes in commit order.
//!
//! A callback may read, write, subscribe or unsubscribe. Deliveries queued
//! from inside a callback are run by the flush already in progress, after
//! the current callback returns.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use crate::error::Result;
use crate::paths::DocPath;

/// Callback receiving the value at the subscribed path, `None` when absent.
pub type UpdateFn = Arc<dyn Fn(Option<Value>) + Send + Sync>;

struct Listener {
    path: DocPath,
    callback: UpdateFn,
    active: AtomicBool,
}

struct Delivery {
    listener: Arc<Listener>,
    value: Option<Value>,
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<Delivery>,
    draining: bool,
}

/// Registered listeners of one store.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Arc<Listener>>>,
    queue: Mutex<Queue>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ListenerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `callback` for `path` and queue its first delivery with
    /// `current`, the value at `path` right now.
    ///
    /// Call under the backend's write lock, then [`flush`](Self::flush)
    /// after releasing it.
    pub fn register(
        self: &Arc<Self>,
        path: DocPath,
        callback: UpdateFn,
        current: Option<Value>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener {
            path: path.clone(),
            callback,
            active: AtomicBool::new(true),
        });
        lock(&self.listeners).insert(id, Arc::clone(&listener));
        lock(&self.queue).pending.push_back(Delivery {
            listener,
            value: current,
        });
        tracing::trace!(listener = id, path = %path, "listener registered");
        Subscription {
            id,
            path,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        if let Some(listener) = lock(&self.listeners).remove(&id) {
            listener.active.store(false, Ordering::Release);
            tracing::trace!(listener = id, "listener removed");
        }
    }

    /// Number of live listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue a delivery for every listener overlapping any of `written`.
    ///
    /// `value_at` snapshots the value a listener should see. A listener
    /// whose snapshot fails is skipped for this write.
    ///
    /// Call under the backend's write lock, after the write is applied.
    pub fn enqueue_affected<F>(&self, written: &[DocPath], mut value_at: F)
    where
        F: FnMut(&DocPath) -> Result<Option<Value>>,
    {
        let affected: Vec<Arc<Listener>> = lock(&self.listeners)
            .values()
            .filter(|l| written.iter().any(|w| w.overlaps(&l.path)))
            .cloned()
            .collect();
        if affected.is_empty() {
            return;
        }

        let mut deliveries = Vec::with_capacity(affected.len());
        for listener in affected {
            match value_at(&listener.path) {
                Ok(value) => deliveries.push(Delivery { listener, value }),
                Err(e) => {
                    tracing::warn!(path = %listener.path, error = %e, "skipping notification");
                }
            }
        }
        lock(&self.queue).pending.extend(deliveries);
    }

    /// Run queued callbacks. Call with no backend lock held.
    ///
    /// Returns immediately if another flush is already draining the queue;
    /// that flush delivers everything queued so far.
    pub fn flush(&self) {
        {
            let mut queue = lock(&self.queue);
            if queue.draining || queue.pending.is_empty() {
                return;
            }
            queue.draining = true;
        }

        loop {
            let next = {
                let mut queue = lock(&self.queue);
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.draining = false;
                }
                next
            };
            let Some(delivery) = next else { break };
            if delivery.listener.active.load(Ordering::Acquire) {
                (delivery.listener.callback)(delivery.value);
            }
        }
    }
}

/// Handle to a live subscription.
///
/// Call [`Subscription::unsubscribe`] when the owning scope ends. Dropping
/// the handle unsubscribes as well. No callback runs after either returns
/// on the unsubscribing thread.
pub struct Subscription {
    id: u64,
    path: DocPath,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    /// The subscribed path.
    #[must_use]
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// Stop receiving updates.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
