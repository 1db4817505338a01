use dnsreplay_domain::{CapturedPacket, DomainError};

/// A stream of already decoded packets, e.g. one capture file.
pub trait CaptureSource {
    /// Human readable name used in logs.
    fn name(&self) -> &str;

    /// Returns the next packet, or `None` once the source is exhausted.
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, DomainError>;
}
