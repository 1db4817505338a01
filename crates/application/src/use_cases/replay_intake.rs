use dnsreplay_domain::dns_header::{self, MessageKind};
use dnsreplay_domain::{CapturedPacket, Query, TimingMode};
use std::sync::Arc;
use tracing::{debug, error};

use super::intake_stats::IntakeStats;
use crate::ports::{Clock, QueryDispatcher};
use crate::services::Pacer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Payload shorter than a DNS header.
    Truncated,
    /// Capture could not tell UDP from TCP.
    UnknownTransport,
    /// Payload rejected while building the query.
    InvalidQuery,
    /// The client pool refused the query.
    DispatchFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    Sent,
    Ignored,
    Dropped(DropReason),
}

/// Turns captured packets into queries: paces them, filters out everything
/// that is not a DNS query and spreads the rest over the client pools.
pub struct ReplayIntake<C: Clock> {
    pacer: Pacer<C>,
    dispatchers: Vec<Arc<dyn QueryDispatcher>>,
    next_dispatcher: usize,
    stats: Arc<IntakeStats>,
    dry_run: bool,
}

impl<C: Clock> ReplayIntake<C> {
    pub fn new(mode: TimingMode, clock: C, dispatchers: Vec<Arc<dyn QueryDispatcher>>) -> Self {
        Self {
            pacer: Pacer::new(mode, clock),
            dispatchers,
            next_dispatcher: 0,
            stats: Arc::new(IntakeStats::new()),
            dry_run: false,
        }
    }

    /// Processes packets without handing any query to a dispatcher.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn stats(&self) -> Arc<IntakeStats> {
        self.stats.clone()
    }

    pub fn pacer(&self) -> &Pacer<C> {
        &self.pacer
    }

    /// Starts a new capture source; its first packet sets a fresh clock offset.
    pub fn begin_source(&mut self) {
        self.pacer.reset();
    }

    pub fn process(&mut self, packet: &CapturedPacket) -> IntakeOutcome {
        self.stats.record_seen();
        self.pacer.pace(packet.timestamp);

        let outcome = self.queue_dns(packet);
        match outcome {
            IntakeOutcome::Sent => self.stats.record_sent(packet.len()),
            IntakeOutcome::Ignored => self.stats.record_ignored(),
            IntakeOutcome::Dropped(_) => self.stats.record_dropped(),
        }
        outcome
    }

    fn queue_dns(&mut self, packet: &CapturedPacket) -> IntakeOutcome {
        match dns_header::classify(&packet.payload) {
            MessageKind::Truncated(len) => {
                debug!(target: "core", len, "payload shorter than a DNS header, dropped");
                return IntakeOutcome::Dropped(DropReason::Truncated);
            }
            MessageKind::Response(header) => {
                debug!(target: "core", id = header.id, "not a query, ignored");
                return IntakeOutcome::Ignored;
            }
            MessageKind::Query(_) => {}
        }

        let Some(transport) = packet.transport else {
            debug!(target: "core", "packet is neither UDP nor TCP, dropped");
            return IntakeOutcome::Dropped(DropReason::UnknownTransport);
        };

        let mut query = Query::new();
        if let Err(e) = query
            .set_transport(transport)
            .and_then(|_| query.set_raw(&packet.payload))
        {
            debug!(target: "core", error = %e, "unable to build query, dropped");
            return IntakeOutcome::Dropped(DropReason::InvalidQuery);
        }

        if self.dry_run {
            return IntakeOutcome::Sent;
        }

        if self.dispatchers.is_empty() {
            error!(target: "core", "no client pool to send to, query dropped");
            return IntakeOutcome::Dropped(DropReason::DispatchFailed);
        }

        let index = self.next_dispatcher % self.dispatchers.len();
        self.next_dispatcher = (index + 1) % self.dispatchers.len();

        match self.dispatchers[index].dispatch(query) {
            Ok(()) => IntakeOutcome::Sent,
            Err(e) => {
                error!(target: "core", pool = index, error = %e, "unable to queue query");
                IntakeOutcome::Dropped(DropReason::DispatchFailed)
            }
        }
    }
}
