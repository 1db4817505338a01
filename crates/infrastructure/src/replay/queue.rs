use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Why a push did not happen. The item is handed back in every case.
#[derive(Debug, PartialEq, Eq)]
pub enum PushError<T> {
    /// The queue is full right now; only returned by `try_push`.
    Full(T),
    /// The queue stayed full for the whole timeout.
    TimedOut(T),
    /// The queue was closed, no consumer will ever see the item.
    Closed(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::TimedOut(item) | PushError::Closed(item) => item,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PopOutcome<T> {
    Item(T),
    Empty,
    /// The lock could not be taken within the wait budget.
    Contended,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Fixed capacity FIFO shared between the intake thread and an engine.
///
/// Producers block on `push_timeout` while the queue is full. The consumer
/// only ever uses `try_pop`, which waits for the lock at most `wait` and never
/// waits for items.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(PushError::Closed(item));
        }
        if inner.items.len() >= self.capacity {
            return Err(PushError::Full(item));
        }
        inner.items.push_back(item);
        Ok(())
    }

    /// Pushes `item`, waiting up to `timeout` for space.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(PushError::Closed(item));
            }
            if inner.items.len() < self.capacity {
                inner.items.push_back(item);
                return Ok(());
            }
            if self.not_full.wait_until(&mut inner, deadline).timed_out() {
                if inner.closed {
                    return Err(PushError::Closed(item));
                }
                if inner.items.len() < self.capacity {
                    inner.items.push_back(item);
                    return Ok(());
                }
                return Err(PushError::TimedOut(item));
            }
        }
    }

    pub fn try_pop(&self, wait: Duration) -> PopOutcome<T> {
        let Some(mut inner) = self.inner.try_lock_for(wait) else {
            return PopOutcome::Contended;
        };
        match inner.items.pop_front() {
            Some(item) => {
                drop(inner);
                self.not_full.notify_one();
                PopOutcome::Item(item)
            }
            None => PopOutcome::Empty,
        }
    }

    /// Drops every queued item and returns how many there were.
    pub fn flush(&self) -> usize {
        let drained: Vec<T> = self.inner.lock().items.drain(..).collect();
        self.not_full.notify_all();
        drained.len()
    }

    /// Rejects all future pushes and wakes blocked producers.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_full.notify_all();
    }
}
