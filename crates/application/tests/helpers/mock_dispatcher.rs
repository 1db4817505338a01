use dnsreplay_application::ports::QueryDispatcher;
use dnsreplay_domain::{DomainError, Query};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::ManualClock;

#[derive(Default)]
pub struct MockDispatcher {
    received: Mutex<Vec<Query>>,
    should_fail: AtomicBool,
    clock: Option<ManualClock>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivery on `clock` for every dispatched query.
    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<Query> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl QueryDispatcher for MockDispatcher {
    fn dispatch(&self, query: Query) -> Result<(), DomainError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(DomainError::QueueClosed);
        }
        if let Some(clock) = &self.clock {
            clock.mark_delivery();
        }
        self.received.lock().unwrap().push(query);
        Ok(())
    }
}
