use dnsreplay_application::ports::Clock;
use dnsreplay_domain::Timespec;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    now: Timespec,
    sleeps: Vec<Timespec>,
    deliveries: Vec<Timespec>,
}

/// Clock that only moves when told to, or when something sleeps on it.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<State>>,
}

impl ManualClock {
    pub fn starting_at(secs: i64, nanos: i64) -> Self {
        let clock = Self::default();
        clock.state.lock().unwrap().now = Timespec::new(secs, nanos);
        clock
    }

    pub fn advance(&self, by: Timespec) {
        let mut state = self.state.lock().unwrap();
        state.now = state.now + by;
    }

    pub fn current(&self) -> Timespec {
        self.state.lock().unwrap().now
    }

    /// Deadlines passed to `sleep_until`, in call order.
    pub fn sleeps(&self) -> Vec<Timespec> {
        self.state.lock().unwrap().sleeps.clone()
    }

    /// Records the current time as a delivery instant.
    pub fn mark_delivery(&self) {
        let mut state = self.state.lock().unwrap();
        let now = state.now;
        state.deliveries.push(now);
    }

    pub fn deliveries(&self) -> Vec<Timespec> {
        self.state.lock().unwrap().deliveries.clone()
    }

    /// Gaps between consecutive deliveries.
    pub fn delivery_gaps(&self) -> Vec<Timespec> {
        self.deliveries()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timespec {
        self.state.lock().unwrap().now
    }

    fn sleep_until(&self, deadline: Timespec) {
        let mut state = self.state.lock().unwrap();
        state.sleeps.push(deadline);
        if deadline > state.now {
            state.now = deadline;
        }
    }
}
