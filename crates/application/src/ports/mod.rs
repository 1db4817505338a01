mod capture_source;
mod clock;
mod query_dispatcher;

pub use capture_source::CaptureSource;
pub use clock::Clock;
pub use query_dispatcher::QueryDispatcher;

// Re-export for convenience
pub use dnsreplay_domain::{CapturedPacket, Query};
