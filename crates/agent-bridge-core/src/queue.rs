//! Per-request mailbox correlating asynchronous wire events to one HTTP
//! response.
//!
//! A [`MessageQueue`] is an unbounded FIFO of [`QueueItem`]s with
//! receive-with-deadline semantics:
//!
//! - `enqueue` hands the item to the oldest waiting receiver, or buffers it.
//! - `dequeue` returns the oldest buffered item immediately, otherwise waits
//!   until an item arrives or the deadline passes.
//! - `close` is terminal: waiters fail with [`QueueError::Closed`], the buffer
//!   is discarded, later enqueues are dropped and later dequeues fail.
//!
//! Each item is delivered to exactly one receiver. A receiver that times out
//! (or whose future is dropped) is removed from the wait list before its
//! outcome is decided, so an item handed over at the deadline is returned
//! rather than lost.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::QueueError;
use crate::wire::QueueItem;

/// Safety-net ceiling for receives that do not pass an explicit timeout.
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(600);

struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<QueueItem>,
}

#[derive(Default)]
struct QueueState {
    buffer: VecDeque<QueueItem>,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
    closed: bool,
}

/// Order-preserving mailbox for a single request id.
pub struct MessageQueue {
    state: Mutex<QueueState>,
    default_timeout: Duration,
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MessageQueue")
            .field("buffered", &state.buffer.len())
            .field("waiting", &state.waiters.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    /// Create an open queue with the default ceiling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_timeout(DEFAULT_QUEUE_TIMEOUT)
    }

    /// Create an open queue whose [`dequeue_default`](Self::dequeue_default)
    /// waits at most `default_timeout`.
    #[must_use]
    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            default_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an item to the oldest waiter, or buffer it.
    ///
    /// Dropped silently once the queue is closed.
    pub fn enqueue(&self, item: QueueItem) {
        let mut state = self.lock();
        if state.closed {
            return;
        }

        let mut item = item;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.tx.send(item) {
                Ok(()) => return,
                // Receiver went away without deregistering; try the next one.
                Err(returned) => item = returned,
            }
        }
        state.buffer.push_back(item);
    }

    /// Receive the next item, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Closed`] if the queue is closed before or while waiting.
    /// - [`QueueError::Timeout`] if nothing arrived in time.
    pub async fn dequeue(&self, timeout: Duration) -> Result<QueueItem, QueueError> {
        let (ticket, mut rx) = {
            let mut state = self.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if let Some(item) = state.buffer.pop_front() {
                return Ok(item);
            }

            let (tx, rx) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push_back(Waiter { ticket, tx });
            (ticket, rx)
        };

        let registration = Registration {
            queue: self,
            ticket,
        };

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(item)) => Ok(item),
            Ok(Err(_)) => Err(QueueError::Closed),
            Err(_) => {
                registration.withdraw();
                // A hand-off may have raced the deadline.
                match rx.try_recv() {
                    Ok(item) => Ok(item),
                    Err(_) if self.is_closed() => Err(QueueError::Closed),
                    Err(_) => Err(QueueError::Timeout),
                }
            }
        }
    }

    /// Receive with the queue's default ceiling.
    pub async fn dequeue_default(&self) -> Result<QueueItem, QueueError> {
        self.dequeue(self.default_timeout).await
    }

    /// Close the queue, failing all waiters and discarding buffered items.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.buffer.clear();
        // Dropping the senders wakes every receiver with a recv error.
        state.waiters.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of buffered, undelivered items.
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of receivers currently suspended in `dequeue`.
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    fn withdraw(&self, ticket: u64) {
        self.lock().waiters.retain(|w| w.ticket != ticket);
    }
}

/// Removes a waiter from the wait list when its receive ends for any reason,
/// including the receiving future being dropped.
struct Registration<'a> {
    queue: &'a MessageQueue,
    ticket: u64,
}

impl Registration<'_> {
    fn withdraw(&self) {
        self.queue.withdraw(self.ticket);
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.withdraw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireEvent;
    use std::sync::Arc;
    use tokio::time::Instant;
    use tokio_test::{assert_pending, assert_ready, task};

    fn chunk(data: &str) -> QueueItem {
        QueueItem::Event(WireEvent::Chunk {
            data: Some(data.to_string()),
        })
    }

    #[tokio::test]
    async fn buffered_items_come_out_in_order() {
        let queue = MessageQueue::new();
        queue.enqueue(chunk("a"));
        queue.enqueue(chunk("b"));
        queue.enqueue(QueueItem::StreamEnd);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue(Duration::ZERO).await, Ok(chunk("a")));
        assert_eq!(queue.dequeue(Duration::ZERO).await, Ok(chunk("b")));
        assert_eq!(queue.dequeue(Duration::ZERO).await, Ok(QueueItem::StreamEnd));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_queue_times_out_no_earlier_than_deadline() {
        let queue = MessageQueue::new();
        let start = Instant::now();

        let result = queue.dequeue(Duration::from_secs(5)).await;

        assert_eq!(result, Err(QueueError::Timeout));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(queue.waiting(), 0, "timed-out receiver must be deregistered");
    }

    #[tokio::test(start_paused = true)]
    async fn prebuffered_item_returns_immediately() {
        let queue = MessageQueue::new();
        queue.enqueue(chunk("ready"));
        let start = Instant::now();

        let result = queue.dequeue(Duration::from_secs(3600)).await;

        assert_eq!(result, Ok(chunk("ready")));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn enqueue_wakes_waiting_receiver() {
        let queue = MessageQueue::new();
        let mut recv = task::spawn(queue.dequeue(Duration::from_secs(60)));

        assert_pending!(recv.poll());
        assert_eq!(queue.waiting(), 1);

        queue.enqueue(chunk("x"));
        assert!(recv.is_woken());
        assert_eq!(assert_ready!(recv.poll()), Ok(chunk("x")));
        assert!(queue.is_empty(), "handed-off item must not be buffered");
    }

    #[tokio::test]
    async fn waiters_are_served_oldest_first() {
        let queue = MessageQueue::new();
        let mut first = task::spawn(queue.dequeue(Duration::from_secs(60)));
        let mut second = task::spawn(queue.dequeue(Duration::from_secs(60)));
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        queue.enqueue(chunk("1"));
        queue.enqueue(chunk("2"));

        assert_eq!(assert_ready!(first.poll()), Ok(chunk("1")));
        assert_eq!(assert_ready!(second.poll()), Ok(chunk("2")));
    }

    #[tokio::test]
    async fn close_fails_all_waiters_and_empties_buffer() {
        let queue = Arc::new(MessageQueue::new());
        let mut handles = Vec::new();
        for _ in 0..3 {
            let q = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                q.dequeue(Duration::from_secs(60)).await
            }));
        }
        while queue.waiting() < 3 {
            tokio::task::yield_now().await;
        }

        queue.close();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err(QueueError::Closed));
        }
        assert_eq!(queue.waiting(), 0);
    }

    #[tokio::test]
    async fn closed_queue_rejects_everything() {
        let queue = MessageQueue::new();
        queue.enqueue(chunk("lost"));
        queue.close();
        assert!(queue.is_empty());

        queue.enqueue(chunk("ignored"));
        assert!(queue.is_empty());
        assert_eq!(
            queue.dequeue(Duration::from_secs(60)).await,
            Err(QueueError::Closed)
        );

        // Idempotent.
        queue.close();
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_swallow_items() {
        let queue = MessageQueue::new();
        {
            let mut abandoned = task::spawn(queue.dequeue(Duration::from_secs(60)));
            assert_pending!(abandoned.poll());
        }
        assert_eq!(queue.waiting(), 0);

        queue.enqueue(chunk("kept"));
        assert_eq!(queue.dequeue(Duration::ZERO).await, Ok(chunk("kept")));
    }

    #[tokio::test(start_paused = true)]
    async fn default_ceiling_applies_without_explicit_timeout() {
        let queue = MessageQueue::with_default_timeout(Duration::from_millis(250));
        let start = Instant::now();
        assert_eq!(queue.dequeue_default().await, Err(QueueError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
