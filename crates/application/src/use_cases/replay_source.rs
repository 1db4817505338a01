use dnsreplay_domain::DomainError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::replay_intake::ReplayIntake;
use crate::ports::{CaptureSource, Clock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub packets: u64,
    pub interrupted: bool,
}

/// Replays one capture source from start to end.
pub struct ReplaySourceUseCase {
    cancel: CancellationToken,
}

impl ReplaySourceUseCase {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn execute<C: Clock>(
        &self,
        intake: &mut ReplayIntake<C>,
        source: &mut dyn CaptureSource,
    ) -> Result<SourceReport, DomainError> {
        let mut report = SourceReport::default();
        intake.begin_source();

        info!(target: "core", source = source.name(), "replaying capture source");

        while !self.cancel.is_cancelled() {
            let Some(packet) = source.next_packet()? else {
                break;
            };
            intake.process(&packet);
            report.packets += 1;
        }
        report.interrupted = self.cancel.is_cancelled();

        info!(
            target: "core",
            source = source.name(),
            packets = report.packets,
            interrupted = report.interrupted,
            "capture source done"
        );
        Ok(report)
    }
}
