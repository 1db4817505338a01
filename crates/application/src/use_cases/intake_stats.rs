use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of the packet intake path.
#[derive(Debug, Default)]
pub struct IntakeStats {
    seen: AtomicU64,
    sent: AtomicU64,
    dropped: AtomicU64,
    ignored: AtomicU64,
    bytes_sent: AtomicU64,
}

impl IntakeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_seen(&self) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        IntakeSnapshot {
            seen: self.seen.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeSnapshot {
    pub seen: u64,
    pub sent: u64,
    pub dropped: u64,
    pub ignored: u64,
    pub bytes_sent: u64,
}

impl IntakeSnapshot {
    /// Every packet seen ends up sent, dropped or ignored.
    pub fn reconciles(&self) -> bool {
        self.seen == self.sent + self.dropped + self.ignored
    }
}
