use dnsreplay_domain::{CapturedPacket, Transport};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;

fn encode(id: u16, domain: &str, message_type: MessageType) -> Vec<u8> {
    let mut query = Query::new();
    query.set_name(Name::from_str(domain).unwrap());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(id, message_type, OpCode::Query);
    message.metadata.recursion_desired = true;
    message.add_query(query);

    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).unwrap();
    buf
}

pub fn query_bytes(id: u16, domain: &str) -> Vec<u8> {
    encode(id, domain, MessageType::Query)
}

pub fn response_bytes(id: u16, domain: &str) -> Vec<u8> {
    encode(id, domain, MessageType::Response)
}

pub fn packet(payload: Vec<u8>, transport: Option<Transport>, secs: i64, micros: i64) -> CapturedPacket {
    CapturedPacket::new(payload, transport, secs, micros)
}
