use dnsreplay_domain::{Timespec, TimingMode};
use tracing::trace;

use crate::ports::Clock;

#[derive(Debug, Clone, Copy)]
struct SourceTiming {
    /// Local monotonic time minus the first captured timestamp.
    offset: Timespec,
    last_original: Timespec,
    last_target: Timespec,
}

/// Projects captured timestamps onto the local monotonic clock and sleeps the
/// calling thread until each packet is due.
///
/// The clock offset is taken from the first packet of a source and kept until
/// [`Pacer::reset`] starts a new source.
pub struct Pacer<C: Clock> {
    mode: TimingMode,
    clock: C,
    source: Option<SourceTiming>,
    last_delivery: Option<Timespec>,
}

impl<C: Clock> Pacer<C> {
    pub fn new(mode: TimingMode, clock: C) -> Self {
        Self {
            mode,
            clock,
            source: None,
            last_delivery: None,
        }
    }

    pub fn mode(&self) -> TimingMode {
        self.mode
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Forgets the current source so the next packet captures a new offset.
    pub fn reset(&mut self) {
        self.source = None;
    }

    /// Local time of the most recent delivery.
    pub fn last_delivery(&self) -> Option<Timespec> {
        self.last_delivery
    }

    /// Computes the local deadline for a packet captured at `original`.
    ///
    /// Returns `None` when the packet is due immediately regardless of the
    /// clock (mode `ignore`).
    pub fn deadline(&mut self, original: Timespec) -> Option<Timespec> {
        if self.mode.is_ignore() {
            return None;
        }

        let Some(source) = self.source.as_mut() else {
            let now = self.clock.now();
            self.source = Some(SourceTiming {
                offset: now - original,
                last_original: original,
                last_target: now,
            });
            return Some(now);
        };

        let target = match self.mode {
            TimingMode::Keep => original + source.offset,
            mode => source.last_target + mode.adjust_gap(original - source.last_original),
        };

        source.last_original = source.last_original.max(original);
        source.last_target = target;
        Some(target)
    }

    /// Sleeps until the packet captured at `original` is due and returns how
    /// long it slept. Deadlines in the past return immediately.
    pub fn pace(&mut self, original: Timespec) -> Timespec {
        let slept = match self.deadline(original) {
            Some(deadline) => {
                let now = self.clock.now();
                if deadline > now {
                    trace!(deadline = %deadline, "pacing packet");
                    self.clock.sleep_until(deadline);
                    deadline - now
                } else {
                    Timespec::ZERO
                }
            }
            None => Timespec::ZERO,
        };
        self.last_delivery = Some(self.clock.now());
        slept
    }
}
