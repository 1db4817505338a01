mod helpers;

use dnsreplay_application::services::Pacer;
use dnsreplay_domain::{Timespec, TimingMode};
use helpers::ManualClock;

fn ts(secs: i64, micros: i64) -> Timespec {
    Timespec::from_micros(secs, micros)
}

/// Paces `stamps` and returns the local delivery instants.
fn deliveries(mode: TimingMode, stamps: &[Timespec]) -> (Vec<Timespec>, ManualClock) {
    let clock = ManualClock::starting_at(500, 0);
    let mut pacer = Pacer::new(mode, clock.clone());
    let mut out = Vec::new();
    for stamp in stamps {
        pacer.pace(*stamp);
        out.push(clock.current());
    }
    (out, clock)
}

fn gaps(points: &[Timespec]) -> Vec<Timespec> {
    points.windows(2).map(|w| w[1] - w[0]).collect()
}

#[test]
fn test_keep_reproduces_captured_spacing() {
    let stamps = [ts(1_000, 0), ts(1_000, 250_000), ts(1_001, 0), ts(1_003, 500)];
    let (points, _) = deliveries(TimingMode::Keep, &stamps);

    assert_eq!(points[0], Timespec::new(500, 0), "first packet is delivered at once");
    assert_eq!(gaps(&points), gaps(&stamps));
}

#[test]
fn test_keep_uses_offset_from_first_packet_only() {
    let clock = ManualClock::starting_at(10, 0);
    let mut pacer = Pacer::new(TimingMode::Keep, clock.clone());

    pacer.pace(ts(100, 0));
    // processing took a while: the deadline is still anchored on the first packet
    clock.advance(Timespec::new(0, 400_000_000));
    pacer.pace(ts(101, 0));

    assert_eq!(clock.current(), Timespec::new(11, 0));
    assert_eq!(clock.sleeps(), vec![Timespec::new(11, 0)]);
}

#[test]
fn test_keep_does_not_sleep_for_late_packets() {
    let clock = ManualClock::starting_at(10, 0);
    let mut pacer = Pacer::new(TimingMode::Keep, clock.clone());

    pacer.pace(ts(100, 0));
    clock.advance(Timespec::new(5, 0));
    let slept = pacer.pace(ts(101, 0));

    assert_eq!(slept, Timespec::ZERO);
    assert!(clock.sleeps().is_empty(), "past deadlines must not sleep");
}

#[test]
fn test_ignore_never_sleeps() {
    let stamps = [ts(1, 0), ts(50, 0), ts(900, 0)];
    let (points, clock) = deliveries(TimingMode::Ignore, &stamps);
    assert!(gaps(&points).iter().all(|g| *g == Timespec::ZERO));
    assert!(clock.sleeps().is_empty());
}

#[test]
fn test_multiply_scales_gaps() {
    let stamps = [ts(0, 0), ts(0, 100_000), ts(0, 400_000)];
    let (points, _) = deliveries(TimingMode::Multiply { factor: 2.0 }, &stamps);
    assert_eq!(
        gaps(&points),
        vec![Timespec::new(0, 200_000_000), Timespec::new(0, 600_000_000)]
    );

    let (points, _) = deliveries(TimingMode::Multiply { factor: 0.5 }, &stamps);
    assert_eq!(
        gaps(&points),
        vec![Timespec::new(0, 50_000_000), Timespec::new(0, 150_000_000)]
    );
}

#[test]
fn test_reduce_floors_each_gap() {
    let stamps = [ts(0, 0), ts(0, 100_000), ts(0, 130_000)];
    let (points, _) = deliveries(TimingMode::Reduce { nanos: 50_000_000 }, &stamps);
    assert_eq!(gaps(&points), vec![Timespec::new(0, 50_000_000), Timespec::ZERO]);
}

#[test]
fn test_increase_extends_each_gap() {
    let stamps = [ts(0, 0), ts(0, 0), ts(1, 0)];
    let (points, _) = deliveries(TimingMode::Increase { nanos: 10_000_000 }, &stamps);
    assert_eq!(
        gaps(&points),
        vec![Timespec::new(0, 10_000_000), Timespec::new(1, 10_000_000)]
    );
}

#[test]
fn test_out_of_order_and_duplicate_stamps_never_sleep_backwards() {
    let stamps = [ts(10, 0), ts(9, 0), ts(9, 0), ts(10, 500_000), ts(2, 999_999)];
    for mode in [
        TimingMode::Keep,
        TimingMode::Reduce { nanos: 1 },
        TimingMode::Multiply { factor: 3.0 },
        TimingMode::Increase { nanos: 0 },
    ] {
        let clock = ManualClock::starting_at(0, 0);
        let mut pacer = Pacer::new(mode, clock.clone());
        let mut previous = clock.current();
        for stamp in stamps {
            let slept = pacer.pace(stamp);
            assert!(!slept.is_negative(), "{mode}: negative sleep");
            assert!(slept.subsec_nanos() < 1_000_000_000);
            assert!(clock.current() >= previous, "{mode}: clock went backwards");
            previous = clock.current();
        }
    }
}

#[test]
fn test_reset_recomputes_offset() {
    let clock = ManualClock::starting_at(0, 0);
    let mut pacer = Pacer::new(TimingMode::Keep, clock.clone());

    pacer.pace(ts(1_000, 0));
    pacer.pace(ts(1_002, 0));
    assert_eq!(clock.current(), Timespec::new(2, 0));

    // a new source restarting from the same capture timestamps
    pacer.reset();
    pacer.pace(ts(1_000, 0));
    assert_eq!(clock.current(), Timespec::new(2, 0), "first packet of a new source is immediate");
    pacer.pace(ts(1_001, 0));
    assert_eq!(clock.current(), Timespec::new(3, 0));
}

#[test]
fn test_deadline_reports_target_without_sleeping() {
    let clock = ManualClock::starting_at(7, 0);
    let mut pacer = Pacer::new(TimingMode::Keep, clock.clone());

    assert_eq!(pacer.deadline(ts(3, 0)), Some(Timespec::new(7, 0)));
    assert_eq!(pacer.deadline(ts(4, 1)), Some(Timespec::new(8, 1_000)));
    assert!(clock.sleeps().is_empty());

    let mut ignore = Pacer::new(TimingMode::Ignore, clock);
    assert_eq!(ignore.deadline(ts(3, 0)), None);
}
