//! Blocking FIFO of image paths shared by the producer and the workers.
//!
//! The queue is single-use: once `finished` or `stop` has been set it is
//! never cleared, and a new run creates a new queue.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<PathBuf>,
    finished: bool,
    stop_requested: bool,
}

/// Thread-safe work queue with finish and stop signaling.
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl TaskQueue {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a path and wakes one waiting consumer.
    ///
    /// The path is dropped if a stop has been requested.
    pub fn enqueue(&self, path: impl Into<PathBuf>) {
        let mut state = self.lock();
        if state.stop_requested {
            return;
        }
        state.pending.push_back(path.into());
        self.available.notify_one();
    }

    /// Takes the next path, blocking while the queue is empty and still open.
    ///
    /// Returns `None` once a stop has been requested, or when the queue is
    /// empty and production has finished.
    pub fn dequeue(&self) -> Option<PathBuf> {
        let mut state = self
            .available
            .wait_while(self.lock(), |s| {
                s.pending.is_empty() && !s.finished && !s.stop_requested
            })
            .unwrap_or_else(PoisonError::into_inner);

        if state.stop_requested {
            return None;
        }
        state.pending.pop_front()
    }

    /// Marks production as finished and wakes all consumers.
    pub fn set_finished(&self) {
        self.lock().finished = true;
        self.available.notify_all();
    }

    /// True when production has finished and every path has been taken.
    pub fn is_finished(&self) -> bool {
        let state = self.lock();
        state.finished && state.pending.is_empty()
    }

    /// Requests cancellation and wakes all consumers.
    ///
    /// Paths still pending are never handed out.
    pub fn set_stop_request(&self) {
        self.lock().stop_requested = true;
        self.available.notify_all();
    }

    /// True once a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Number of pending paths.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// True if no path is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn dequeues_in_fifo_order() {
        let queue = TaskQueue::new();
        for name in ["a", "b", "c"] {
            queue.enqueue(name);
        }
        queue.set_finished();
        assert_eq!(queue.len(), 3);
        assert!(!queue.is_finished());

        let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(
            drained,
            vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")]
        );
        assert!(queue.is_finished());
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn consumers_drain_every_item_exactly_once() {
        const ITEMS: usize = 500;
        const CONSUMERS: usize = 8;

        let queue = Arc::new(TaskQueue::new());
        let taken = Arc::new(AtomicUsize::new(0));
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let taken = Arc::clone(&taken);
                thread::spawn(move || {
                    let mut mine = Vec::new();
                    loop {
                        match queue.dequeue() {
                            Some(path) => {
                                taken.fetch_add(1, Ordering::SeqCst);
                                mine.push(path);
                            }
                            None if queue.is_finished() || queue.is_stop_requested() => break,
                            None => continue,
                        }
                    }
                    mine
                })
            })
            .collect();

        for i in 0..ITEMS {
            queue.enqueue(format!("img_{i}.bmp"));
        }
        queue.set_finished();

        let mut all: Vec<PathBuf> = consumers
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(taken.load(Ordering::SeqCst), ITEMS);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), ITEMS);
    }

    #[test]
    fn stop_releases_blocked_consumers() {
        let queue = Arc::new(TaskQueue::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.dequeue())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.set_stop_request();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), None);
        }
    }

    #[test]
    fn stop_discards_pending_and_future_items() {
        let queue = TaskQueue::new();
        queue.enqueue("before.bmp");
        queue.set_stop_request();
        queue.enqueue("after.bmp");

        assert!(queue.is_stop_requested());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn finish_releases_blocked_consumer() {
        let queue = Arc::new(TaskQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue())
        };
        thread::sleep(Duration::from_millis(50));
        queue.set_finished();
        assert_eq!(waiter.join().unwrap(), None);
        assert!(queue.is_finished());
    }
}
