use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

use super::state::QueueSnapshot;

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    pending: Arc<AtomicUsize>,
    closed: AtomicBool,
    notify: Notify,
}

impl<T> Inner<T> {
    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        // The lock is never held across an await or a panic-prone call
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Unbounded multi-producer multi-consumer FIFO between pipeline stages.
///
/// Consumers receive a [`Lease`]; the item stays counted as pending until the
/// lease is dropped, so an empty queue with a worker still busy on its last
/// item is not mistaken for a drained one.
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                pending: Arc::new(AtomicUsize::new(0)),
                closed: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue an item. Returns it back if the queue is already closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        if self.is_closed() {
            return Err(item);
        }

        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        self.inner.items().push_back(item);
        self.inner.notify.notify_one();
        Ok(())
    }

    /// Wait for the next item. Returns `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<Lease<T>> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.inner.items().pop_front();
            if let Some(item) = next {
                return Some(Lease {
                    item,
                    ack: Ack {
                        pending: Arc::clone(&self.inner.pending),
                    },
                });
            }

            if self.is_closed() {
                return None;
            }

            notified.await;
        }
    }

    /// Stop accepting items and wake every waiting consumer
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Items waiting to be picked up
    pub fn len(&self) -> usize {
        self.inner.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items queued plus leased items not yet acknowledged
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        // Pending first: an item moving from queued to leased never makes pending < queued
        let pending = self.pending();
        let queued = self.len();
        QueueSnapshot {
            queued: queued.min(pending),
            pending,
        }
    }
}

/// Acknowledges one leased item when dropped
#[derive(Debug)]
pub struct Ack {
    pending: Arc<AtomicUsize>,
}

impl Drop for Ack {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An item taken from a [`WorkQueue`], acknowledged on drop
#[derive(Debug)]
pub struct Lease<T> {
    item: T,
    ack: Ack,
}

impl<T> Lease<T> {
    /// Take ownership of the item; the returned [`Ack`] completes it when dropped
    pub fn into_parts(self) -> (T, Ack) {
        (self.item, self.ack)
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}
