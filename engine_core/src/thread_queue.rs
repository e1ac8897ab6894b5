//! Thread-safe FIFO queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
}

/// Multi-producer, multi-consumer queue with blocking pops.
///
/// Clones share the same queue.
pub struct ThreadQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ThreadQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ThreadQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ThreadQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn push(&self, item: T) {
        self.inner.items.lock().push_back(item);
        self.inner.ready.notify_one();
    }

    pub fn try_pop(&self) -> Option<T> {
        self.inner.items.lock().pop_front()
    }

    /// Blocks until an item is available.
    pub fn wait_pop(&self) -> T {
        let mut items = self.inner.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            self.inner.ready.wait(&mut items);
        }
    }

    /// Like [`ThreadQueue::wait_pop`], giving up after `timeout`.
    pub fn wait_pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut items = self.inner.items.lock();
        if items.is_empty() {
            self.inner.ready.wait_while_for(&mut items, |items| items.is_empty(), timeout);
        }
        items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    /// Removes and returns everything queued.
    pub fn drain(&self) -> Vec<T> {
        self.inner.items.lock().drain(..).collect()
    }
}
