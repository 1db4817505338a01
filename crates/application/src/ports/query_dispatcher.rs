use dnsreplay_domain::{DomainError, Query};

/// Hands a query over to whatever sends it, usually a client pool.
///
/// `dispatch` may block while the receiving side applies backpressure.
pub trait QueryDispatcher: Send + Sync {
    fn dispatch(&self, query: Query) -> Result<(), DomainError>;
}
