use dnsreplay_application::ports::QueryDispatcher;
use dnsreplay_application::use_cases::{IntakeSnapshot, ReplayIntake, ReplaySourceUseCase};
use dnsreplay_domain::Config;
use dnsreplay_infrastructure::capture::JsonLinesCapture;
use dnsreplay_infrastructure::clock::MonotonicClock;
use dnsreplay_infrastructure::replay::EngineSnapshot;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub intake: IntakeSnapshot,
    pub passes: u64,
    pub packets: u64,
    pub skipped_lines: u64,
    pub interrupted: bool,
}

/// Feeds every input through the intake, `iterations` times or until
/// interrupted.
pub struct ReplayRunner {
    config: Config,
    inputs: Vec<PathBuf>,
    cancel: CancellationToken,
}

impl ReplayRunner {
    pub fn new(config: Config, inputs: Vec<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            config,
            inputs,
            cancel,
        }
    }

    fn wants_pass(&self, done: u64) -> bool {
        !self.cancel.is_cancelled()
            && (self.config.replay.loop_forever || done < self.config.replay.iterations)
    }

    pub fn run(self, dispatchers: Vec<Arc<dyn QueryDispatcher>>) -> anyhow::Result<ReplayReport> {
        let clock = MonotonicClock::with_cancellation(self.cancel.clone());
        let mut intake = ReplayIntake::new(self.config.timing, clock, dispatchers)
            .with_dry_run(self.config.replay.dry_run);
        let use_case = ReplaySourceUseCase::new(self.cancel.clone());

        info!(
            target: "core",
            timing = %self.config.timing,
            inputs = self.inputs.len(),
            dry_run = self.config.replay.dry_run,
            "Replay started"
        );

        let mut report = ReplayReport::default();
        'passes: while self.wants_pass(report.passes) {
            report.passes += 1;
            info!(target: "core", pass = report.passes, "Replay pass started");

            for path in &self.inputs {
                let mut capture = JsonLinesCapture::open(path)?;
                let source = use_case.execute(&mut intake, &mut capture)?;

                report.packets += source.packets;
                report.skipped_lines += capture.skipped();
                if capture.skipped() > 0 {
                    warn!(
                        target: "core",
                        path = %path.display(),
                        skipped = capture.skipped(),
                        "Capture lines skipped"
                    );
                }
                if source.interrupted {
                    report.interrupted = true;
                    break 'passes;
                }
            }
        }

        report.interrupted |= self.cancel.is_cancelled();
        report.intake = intake.stats().snapshot();
        Ok(report)
    }
}

pub fn log_summary(report: &ReplayReport, engine: &EngineSnapshot) {
    let intake = &report.intake;
    info!(
        target: "core",
        passes = report.passes,
        packets = report.packets,
        skipped_lines = report.skipped_lines,
        seen = intake.seen,
        sent = intake.sent,
        ignored = intake.ignored,
        dropped = intake.dropped,
        bytes = intake.bytes_sent,
        interrupted = report.interrupted,
        "Intake summary"
    );
    info!(
        target: "core",
        created = engine.created,
        reused = engine.reused,
        reuse_pct = engine.reuse_rate() * 100.0,
        succeeded = engine.succeeded,
        failed = engine.failed,
        errors = engine.errors,
        timeouts = engine.timeouts,
        retries = engine.retries,
        lost = engine.lost,
        bytes_sent = engine.bytes_sent,
        bytes_received = engine.bytes_received,
        closed = engine.closed,
        peak_active = engine.peak_active,
        peak_idle = engine.peak_idle,
        "Engine summary"
    );
}
