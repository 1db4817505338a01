use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by one client pool engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    created: AtomicU64,
    reused: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    retries: AtomicU64,
    lost: AtomicU64,
    closed: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    peak_active: AtomicU64,
    peak_idle: AtomicU64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub(crate) fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl EngineStats {
    counter!(record_created, created);
    counter!(record_reused, reused);
    counter!(record_success, succeeded);
    counter!(record_failed, failed);
    counter!(record_error, errors);
    counter!(record_timeout, timeouts);
    counter!(record_retry, retries);
    counter!(record_lost, lost);
    counter!(record_closed, closed);

    pub(crate) fn record_io(&self, sent: u64, received: u64) {
        self.bytes_sent.fetch_add(sent, Ordering::Relaxed);
        self.bytes_received.fetch_add(received, Ordering::Relaxed);
    }

    pub(crate) fn observe_active(&self, active: usize) {
        self.peak_active.fetch_max(active as u64, Ordering::Relaxed);
    }

    pub(crate) fn observe_idle(&self, idle: usize) {
        self.peak_idle.fetch_max(idle as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            peak_active: self.peak_active.load(Ordering::Relaxed),
            peak_idle: self.peak_idle.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Connections opened
    pub created: u64,
    /// Queries sent over a recycled connection
    pub reused: u64,
    pub succeeded: u64,
    /// Refused or unreachable
    pub failed: u64,
    /// Any other OS error
    pub errors: u64,
    /// Connections reaped by the TTL
    pub timeouts: u64,
    /// Retry timer armings after a failed connect
    pub retries: u64,
    /// Queries discarded by the engine
    pub lost: u64,
    /// Connections closed instead of kept idle
    pub closed: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub peak_active: u64,
    pub peak_idle: u64,
}

impl EngineSnapshot {
    /// Queries that reached the wire, over a new or a recycled connection.
    pub fn dispatched(&self) -> u64 {
        self.created + self.reused
    }

    pub fn reuse_rate(&self) -> f64 {
        if self.dispatched() == 0 {
            0.0
        } else {
            self.reused as f64 / self.dispatched() as f64
        }
    }

    /// Adds another pool's counters; peaks keep the larger value.
    pub fn merge(&mut self, other: &EngineSnapshot) {
        self.created += other.created;
        self.reused += other.reused;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.errors += other.errors;
        self.timeouts += other.timeouts;
        self.retries += other.retries;
        self.lost += other.lost;
        self.closed += other.closed;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
        self.peak_active = self.peak_active.max(other.peak_active);
        self.peak_idle = self.peak_idle.max(other.peak_idle);
    }
}
