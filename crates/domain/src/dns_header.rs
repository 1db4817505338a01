//! Just enough DNS header parsing to tell queries from responses.

pub const HEADER_LEN: usize = 12;

const QR_BIT: u16 = 0x8000;
const OPCODE_MASK: u16 = 0x7800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSummary {
    pub id: u16,
    pub opcode: u8,
    pub qdcount: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Query(HeaderSummary),
    Response(HeaderSummary),
    /// Shorter than a DNS header.
    Truncated(usize),
}

pub fn classify(payload: &[u8]) -> MessageKind {
    if payload.len() < HEADER_LEN {
        return MessageKind::Truncated(payload.len());
    }

    let id = u16::from_be_bytes([payload[0], payload[1]]);
    let flags = u16::from_be_bytes([payload[2], payload[3]]);
    let qdcount = u16::from_be_bytes([payload[4], payload[5]]);
    let summary = HeaderSummary {
        id,
        opcode: ((flags & OPCODE_MASK) >> 11) as u8,
        qdcount,
    };

    if flags & QR_BIT != 0 {
        MessageKind::Response(summary)
    } else {
        MessageKind::Query(summary)
    }
}
