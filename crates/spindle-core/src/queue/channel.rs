//! Closable FIFO with async blocking receive.
//!
//! Producers never wait: `try_push` either buffers the item or hands it back.
//! Consumers park in `recv` until an item shows up or the queue is closed
//! and drained.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Rejected push. The item is returned to the caller untouched.
#[derive(Debug, PartialEq, Eq)]
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer, multi-consumer queue with a one-shot close.
///
/// - `capacity == None` means unbounded.
/// - Once closed, pushes fail with `PushError::Closed`, but items buffered
///   before the close are still handed out by `recv`.
/// - `recv` returns `None` only when the queue is closed *and* empty.
pub struct ClosableQueue<T> {
    inner: Mutex<Inner<T>>,
    capacity: Option<usize>,
    notify: Notify,
}

impl<T> ClosableQueue<T> {
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.unwrap_or(0)),
                closed: false,
            }),
            capacity,
            notify: Notify::new(),
        }
    }

    // A panic while holding the lock cannot leave `Inner` half-updated
    // (every mutation is a single push/pop/flag write), so poison is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer `item` without waiting.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(PushError::Closed(item));
            }
            if self.capacity.is_some_and(|cap| inner.items.len() >= cap) {
                return Err(PushError::Full(item));
            }
            inner.items.push_back(item);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Wait for the next item in FIFO order.
    pub async fn recv(&self) -> Option<T> {
        loop {
            // Register interest before looking at the buffer so a push or
            // close between the check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                let popped = inner.items.pop_front();
                if let Some(item) = popped {
                    let more = !inner.items.is_empty();
                    drop(inner);
                    // We may have consumed a permit meant for another item.
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Close the queue. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let first = {
            let mut inner = self.lock();
            !std::mem::replace(&mut inner.closed, true)
        };
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    /// Remove every buffered item without running receivers.
    pub fn drain(&self) -> Vec<T> {
        self.lock().items.drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn bounded_rejects_when_full() {
        let q = ClosableQueue::bounded(2);
        q.try_push(1).unwrap();
        q.try_push(2).unwrap();

        assert_eq!(q.try_push(3), Err(PushError::Full(3)));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn zero_capacity_always_full() {
        let q = ClosableQueue::bounded(0);
        assert_eq!(q.try_push("x"), Err(PushError::Full("x")));
    }

    #[test]
    fn push_after_close_is_rejected() {
        let q = ClosableQueue::unbounded();
        assert!(q.close());
        assert_eq!(q.try_push(1), Err(PushError::Closed(1)));
        assert!(q.is_empty());
    }

    #[test]
    fn close_reports_first_call_only() {
        let q: ClosableQueue<()> = ClosableQueue::unbounded();
        assert!(q.close());
        assert!(!q.close());
        assert!(!q.close());
        assert!(q.is_closed());
    }

    #[tokio::test]
    async fn recv_is_fifo_and_drains_after_close() {
        let q = ClosableQueue::bounded(3);
        q.try_push("a").unwrap();
        q.try_push("b").unwrap();
        q.close();

        assert_eq!(q.recv().await, Some("a"));
        assert_eq!(q.recv().await, Some("b"));
        assert_eq!(q.recv().await, None);
    }

    #[tokio::test]
    async fn push_wakes_blocked_receiver() {
        let q = Arc::new(ClosableQueue::unbounded());

        let rx = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.recv().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        q.try_push(7).unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Some(7));
    }

    #[tokio::test]
    async fn close_wakes_every_blocked_receiver() {
        let q: Arc<ClosableQueue<u32>> = Arc::new(ClosableQueue::unbounded());

        let receivers: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&q);
                tokio::spawn(async move { q.recv().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        q.close();

        for rx in receivers {
            let got = tokio::time::timeout(Duration::from_secs(1), rx)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, None);
        }
    }

    #[test]
    fn drain_empties_buffer() {
        let q = ClosableQueue::unbounded();
        q.try_push(1).unwrap();
        q.try_push(2).unwrap();

        assert_eq!(q.drain(), vec![1, 2]);
        assert!(q.is_empty());
    }
}
