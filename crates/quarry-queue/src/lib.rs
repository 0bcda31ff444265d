//! Unbounded FIFO work queues and a waiter that blocks on several of them.
//!
//! Every queue is registered with one or more [`MultiQueueWaiter`]s at
//! construction; an enqueue signals each of them. A worker calls
//! [`MultiQueueWaiter::wait`] with the set of queues it drains and blocks
//! until any of them holds an item. Cancellation is not supported; workers
//! are process-lived.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// Anything a [`MultiQueueWaiter`] can poll for pending state.
pub trait Waitable {
    fn is_empty(&self) -> bool;
}

/// A shared condition variable that wakes when any registered queue
/// receives an item.
#[derive(Default)]
pub struct MultiQueueWaiter {
    // The lock is held while signaling, so a wakeup between a worker's
    // emptiness check and its wait cannot be lost.
    state: Mutex<()>,
    ready: Condvar,
}

impl MultiQueueWaiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Block until at least one of `queues` is non-empty.
    pub fn wait(&self, queues: &[&dyn Waitable]) {
        let mut guard = self.state.lock().expect("waiter mutex poisoned");
        loop {
            if queues.iter().any(|q| !q.is_empty()) {
                return;
            }
            guard = self.ready.wait(guard).expect("waiter mutex poisoned");
        }
    }

    fn signal(&self) {
        let _guard = self.state.lock().expect("waiter mutex poisoned");
        self.ready.notify_all();
    }
}

/// Unbounded multi-producer/multi-consumer FIFO.
pub struct ThreadedQueue<T> {
    items: Mutex<VecDeque<T>>,
    waiters: Vec<Arc<MultiQueueWaiter>>,
}

impl<T> ThreadedQueue<T> {
    pub fn new(waiter: Arc<MultiQueueWaiter>) -> Self {
        Self::with_waiters(vec![waiter])
    }

    /// A queue drained by more than one worker role registers with each
    /// role's waiter.
    pub fn with_waiters(waiters: Vec<Arc<MultiQueueWaiter>>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            waiters,
        }
    }

    pub fn enqueue(&self, item: T) {
        self.items
            .lock()
            .expect("queue mutex poisoned")
            .push_back(item);
        self.signal_waiters();
    }

    pub fn enqueue_all(&self, items: impl IntoIterator<Item = T>) {
        let mut guard = self.items.lock().expect("queue mutex poisoned");
        let before = guard.len();
        guard.extend(items);
        let grew = guard.len() > before;
        drop(guard);
        if grew {
            self.signal_waiters();
        }
    }

    pub fn try_dequeue(&self) -> Option<T> {
        self.items.lock().expect("queue mutex poisoned").pop_front()
    }

    pub fn size(&self) -> usize {
        self.items.lock().expect("queue mutex poisoned").len()
    }

    fn signal_waiters(&self) {
        for waiter in &self.waiters {
            waiter.signal();
        }
    }
}

impl<T> Waitable for ThreadedQueue<T> {
    fn is_empty(&self) -> bool {
        self.items.lock().expect("queue mutex poisoned").is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let waiter = MultiQueueWaiter::new();
        let queue = ThreadedQueue::new(waiter);
        queue.enqueue(1);
        queue.enqueue_all([2, 3]);
        assert_eq!(queue.size(), 3);
        assert_eq!(queue.try_dequeue(), Some(1));
        assert_eq!(queue.try_dequeue(), Some(2));
        assert_eq!(queue.try_dequeue(), Some(3));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn wait_returns_immediately_when_pending() {
        let waiter = MultiQueueWaiter::new();
        let queue = ThreadedQueue::new(waiter.clone());
        queue.enqueue(7);
        waiter.wait(&[&queue]);
    }

    #[test]
    fn wait_wakes_on_any_queue() {
        let waiter = MultiQueueWaiter::new();
        let a = Arc::new(ThreadedQueue::<u32>::new(waiter.clone()));
        let b = Arc::new(ThreadedQueue::<u32>::new(waiter.clone()));

        let b_producer = Arc::clone(&b);
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            b_producer.enqueue(42);
        });

        waiter.wait(&[a.as_ref(), b.as_ref()]);
        assert_eq!(b.try_dequeue(), Some(42));
        producer.join().unwrap();
    }

    #[test]
    fn a_queue_can_signal_two_waiters() {
        let first = MultiQueueWaiter::new();
        let second = MultiQueueWaiter::new();
        let queue = Arc::new(ThreadedQueue::with_waiters(vec![
            first.clone(),
            second.clone(),
        ]));

        let q = Arc::clone(&queue);
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            q.enqueue(1);
        });

        first.wait(&[queue.as_ref()]);
        second.wait(&[queue.as_ref()]);
        producer.join().unwrap();
    }
}
