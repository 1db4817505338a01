mod helpers;

use dnsreplay_application::ports::QueryDispatcher;
use dnsreplay_application::use_cases::{DropReason, IntakeOutcome, ReplayIntake};
use dnsreplay_domain::{Timespec, TimingMode, Transport};
use helpers::{packet, query_bytes, response_bytes, ManualClock, MockDispatcher};
use std::sync::Arc;

fn intake_with(
    mode: TimingMode,
    pools: usize,
) -> (ReplayIntake<ManualClock>, Vec<Arc<MockDispatcher>>, ManualClock) {
    let clock = ManualClock::starting_at(100, 0);
    let mocks: Vec<Arc<MockDispatcher>> = (0..pools)
        .map(|_| Arc::new(MockDispatcher::with_clock(clock.clone())))
        .collect();
    let dispatchers = mocks
        .iter()
        .map(|m| m.clone() as Arc<dyn QueryDispatcher>)
        .collect();
    (ReplayIntake::new(mode, clock.clone(), dispatchers), mocks, clock)
}

#[test]
fn test_query_is_built_and_dispatched() {
    let (mut intake, mocks, _) = intake_with(TimingMode::Ignore, 1);
    let payload = query_bytes(0x1234, "example.com.");

    let outcome = intake.process(&packet(payload.clone(), Some(Transport::Tcp), 1, 0));

    assert_eq!(outcome, IntakeOutcome::Sent);
    let received = mocks[0].received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].bytes(), payload.as_slice());
    assert_eq!(received[0].transport(), Some(Transport::Tcp));

    let stats = intake.stats().snapshot();
    assert_eq!(stats.seen, 1);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.bytes_sent, payload.len() as u64);
}

#[test]
fn test_responses_are_ignored() {
    let (mut intake, mocks, _) = intake_with(TimingMode::Ignore, 1);

    let outcome = intake.process(&packet(
        response_bytes(1, "example.com."),
        Some(Transport::Udp),
        1,
        0,
    ));

    assert_eq!(outcome, IntakeOutcome::Ignored);
    assert_eq!(mocks[0].count(), 0);
    assert_eq!(intake.stats().snapshot().ignored, 1);
}

#[test]
fn test_short_payload_is_dropped() {
    let (mut intake, mocks, _) = intake_with(TimingMode::Ignore, 1);
    let outcome = intake.process(&packet(vec![0u8; 5], Some(Transport::Udp), 1, 0));
    assert_eq!(outcome, IntakeOutcome::Dropped(DropReason::Truncated));
    assert_eq!(mocks[0].count(), 0);
}

#[test]
fn test_unknown_transport_is_dropped() {
    let (mut intake, _, _) = intake_with(TimingMode::Ignore, 1);
    let outcome = intake.process(&packet(query_bytes(2, "example.org."), None, 1, 0));
    assert_eq!(outcome, IntakeOutcome::Dropped(DropReason::UnknownTransport));
}

#[test]
fn test_dispatch_failure_counts_as_dropped() {
    let (mut intake, mocks, _) = intake_with(TimingMode::Ignore, 1);
    mocks[0].set_should_fail(true);

    let outcome = intake.process(&packet(query_bytes(3, "example.net."), Some(Transport::Udp), 1, 0));
    assert_eq!(outcome, IntakeOutcome::Dropped(DropReason::DispatchFailed));
    assert_eq!(intake.stats().snapshot().dropped, 1);
}

#[test]
fn test_round_robin_across_pools() {
    let (mut intake, mocks, _) = intake_with(TimingMode::Ignore, 3);
    for id in 0..7u16 {
        intake.process(&packet(query_bytes(id, "rr.example."), Some(Transport::Udp), 1, 0));
    }
    let counts: Vec<usize> = mocks.iter().map(|m| m.count()).collect();
    assert_eq!(counts, vec![3, 2, 2]);

    // queries arrive in order within each pool
    let first_ids: Vec<u16> = mocks[0]
        .received()
        .iter()
        .map(|q| u16::from_be_bytes([q.bytes()[0], q.bytes()[1]]))
        .collect();
    assert_eq!(first_ids, vec![0, 3, 6]);
}

#[test]
fn test_dry_run_counts_without_dispatching() {
    let (intake, mocks, _) = intake_with(TimingMode::Ignore, 1);
    let mut intake = intake.with_dry_run(true);

    let outcome = intake.process(&packet(query_bytes(4, "dry.example."), Some(Transport::Udp), 1, 0));
    assert_eq!(outcome, IntakeOutcome::Sent);
    assert_eq!(mocks[0].count(), 0);
    assert_eq!(intake.stats().snapshot().sent, 1);
}

#[test]
fn test_counters_reconcile() {
    let (mut intake, _, _) = intake_with(TimingMode::Ignore, 2);
    let packets = vec![
        packet(query_bytes(1, "a.example."), Some(Transport::Udp), 1, 0),
        packet(response_bytes(1, "a.example."), Some(Transport::Udp), 1, 1),
        packet(vec![1, 2, 3], Some(Transport::Tcp), 1, 2),
        packet(query_bytes(2, "b.example."), None, 1, 3),
        packet(query_bytes(3, "c.example."), Some(Transport::Tcp), 1, 4),
    ];
    for p in &packets {
        intake.process(p);
    }

    let stats = intake.stats().snapshot();
    assert_eq!(stats.seen, 5);
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.dropped, 2);
    assert!(stats.reconciles());
}

#[test]
fn test_keep_mode_paces_dispatch() {
    let (mut intake, _, clock) = intake_with(TimingMode::Keep, 1);
    let stamps = [(50, 0), (50, 20_000), (50, 520_000)];
    for (id, (secs, micros)) in stamps.iter().enumerate() {
        intake.process(&packet(
            query_bytes(id as u16, "paced.example."),
            Some(Transport::Udp),
            *secs,
            *micros,
        ));
    }
    assert_eq!(
        clock.delivery_gaps(),
        vec![Timespec::new(0, 20_000_000), Timespec::new(0, 500_000_000)]
    );
}

#[test]
fn test_non_queries_still_advance_pacing() {
    let (mut intake, _, clock) = intake_with(TimingMode::Keep, 1);
    intake.process(&packet(query_bytes(1, "x.example."), Some(Transport::Udp), 10, 0));
    intake.process(&packet(response_bytes(1, "x.example."), Some(Transport::Udp), 11, 0));
    intake.process(&packet(query_bytes(2, "x.example."), Some(Transport::Udp), 12, 0));

    assert_eq!(clock.delivery_gaps(), vec![Timespec::new(2, 0)]);
    assert_eq!(clock.sleeps().len(), 2);
}
