use smallvec::SmallVec;

use crate::{DomainError, Transport};

/// Payloads up to this size are stored inline.
pub const INLINE_QUERY_BYTES: usize = 64;

/// Largest payload that fits behind a 2-byte stream length prefix.
pub const MAX_QUERY_BYTES: usize = u16::MAX as usize;

/// One captured DNS message on its way to the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    transport: Option<Transport>,
    raw: Option<SmallVec<[u8; INLINE_QUERY_BYTES]>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_udp(&mut self) -> Result<(), DomainError> {
        self.set_transport(Transport::Udp)
    }

    pub fn set_tcp(&mut self) -> Result<(), DomainError> {
        self.set_transport(Transport::Tcp)
    }

    /// Tags the query with a transport. Re-tagging with the same transport is
    /// a no-op, switching to the other one is rejected.
    pub fn set_transport(&mut self, transport: Transport) -> Result<(), DomainError> {
        match self.transport {
            Some(current) if current != transport => Err(DomainError::TransportConflict(current)),
            _ => {
                self.transport = Some(transport);
                Ok(())
            }
        }
    }

    /// Copies `bytes` into the query, replacing any earlier payload.
    pub fn set_raw(&mut self, bytes: &[u8]) -> Result<(), DomainError> {
        if bytes.is_empty() {
            return Err(DomainError::EmptyPayload);
        }
        if bytes.len() > MAX_QUERY_BYTES {
            return Err(DomainError::PayloadTooLarge(bytes.len()));
        }
        self.raw = Some(SmallVec::from_slice(bytes));
        Ok(())
    }

    pub fn has_raw(&self) -> bool {
        self.raw.is_some()
    }

    pub fn transport(&self) -> Option<Transport> {
        self.transport
    }

    pub fn len(&self) -> usize {
        self.raw.as_ref().map_or(0, |raw| raw.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &[u8] {
        self.raw.as_deref().unwrap_or(&[])
    }

    /// True when the payload did not fit the inline buffer.
    pub fn is_spilled(&self) -> bool {
        self.raw.as_ref().is_some_and(|raw| raw.spilled())
    }
}
