use crate::{Timespec, Transport};

/// One decoded packet handed over by the capture layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPacket {
    pub payload: Vec<u8>,
    pub transport: Option<Transport>,
    pub timestamp: Timespec,
}

impl CapturedPacket {
    pub fn new(payload: Vec<u8>, transport: Option<Transport>, secs: i64, micros: i64) -> Self {
        Self {
            payload,
            transport,
            timestamp: Timespec::from_micros(secs, micros),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
