//! Background writer for optimistic updates.
//!
//! Services that update local state first hand the resulting documents to
//! a single writer task per service. The task writes them in the order they
//! were queued, collapsing queued writes to the same path into the last one
//! since each write replaces the whole document. Failures are retried per
//! the [`RetryPolicy`] and then logged; the caller never sees them.
//!
//! Every queued write gets a ticket. [`WriteProgress`] reports how far the
//! task has come, so a service can tell its own stale writes apart when the
//! store echoes them back.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use storefront_store::{DocPath, DocumentStore};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::retry::RetryPolicy;

enum Command {
    Put(DocPath, Value, u64),
    Flush(oneshot::Sender<()>),
}

/// Handle to a running writer task.
pub(crate) struct DocumentWriter {
    /// Last ticket handed out. Held while sending so tickets reach the
    /// task in order.
    tx: Mutex<(u64, mpsc::UnboundedSender<Command>)>,
    settled: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

/// Read side of a writer's progress.
#[derive(Clone)]
pub(crate) struct WriteProgress(watch::Receiver<u64>);

impl WriteProgress {
    /// Whether the write with `ticket` has been attempted or replaced by a
    /// later write to the same path.
    pub(crate) fn reached(&self, ticket: u64) -> bool {
        *self.0.borrow() >= ticket
    }
}

impl DocumentWriter {
    /// Spawn the writer on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::NoRuntime` when called outside a tokio
    /// runtime.
    pub(crate) fn spawn(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Result<Self> {
        let runtime = Handle::try_current()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (settle, settled) = watch::channel(0);
        let task = runtime.spawn(run(store, retry, rx, settle));
        Ok(Self {
            tx: Mutex::new((0, tx)),
            settled,
            task,
        })
    }

    /// Queue a write. Returns its ticket, or `None` if the writer has
    /// stopped.
    pub(crate) fn enqueue(&self, path: DocPath, value: Value) -> Option<u64> {
        let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let (last, tx) = &mut *guard;
        let ticket = *last + 1;
        tx.send(Command::Put(path, value, ticket)).ok()?;
        *last = ticket;
        Some(ticket)
    }

    /// Progress of this writer, usable from store callbacks.
    pub(crate) fn progress(&self) -> WriteProgress {
        WriteProgress(self.settled.clone())
    }

    fn send(&self, command: Command) -> bool {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        guard.1.send(command).is_ok()
    }

    /// Wait until every write queued before this call has been attempted.
    pub(crate) async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.send(Command::Flush(ack)) {
            let _ = done.await;
        }
    }

    /// Stop accepting writes and wait for the queued ones.
    pub(crate) async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "document writer task failed");
        }
    }
}

async fn run(
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<Command>,
    settle: watch::Sender<u64>,
) {
    while let Some(command) = rx.recv().await {
        let mut pending: Vec<(DocPath, Value, u64)> = Vec::new();
        let mut acks = Vec::new();

        let mut next = Some(command);
        while let Some(command) = next.take() {
            match command {
                Command::Put(path, value, ticket) => {
                    pending.retain(|(queued, _, _)| queued != &path);
                    pending.push((path, value, ticket));
                }
                Command::Flush(ack) => {
                    // Writes queued after a flush belong to the next round.
                    acks.push(ack);
                    break;
                }
            }
            next = rx.try_recv().ok();
        }

        for (path, value, ticket) in pending {
            let result = retry
                .run(path.as_str(), || store.write(&path, value.clone()))
                .await;
            match result {
                Ok(()) => tracing::debug!(path = %path, "document written"),
                Err(e) => tracing::error!(
                    path = %path,
                    error = %e,
                    "optimistic write failed after all retries"
                ),
            }
            settle.send_modify(|settled| *settled = (*settled).max(ticket));
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }
    tracing::debug!("document writer stopped");
}
