use dnsreplay_domain::{ClientPoolConfig, Query as ReplayQuery, Transport};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::net::SocketAddr;
use std::str::FromStr;

/// Encodes to well over the inline query size.
pub const LONG_NAME: &str = "a-rather-long-label-for-testing.subdomain.example-zone.com.";

pub fn query_bytes(id: u16, domain: &str) -> Vec<u8> {
    let mut query = Query::new();
    query.set_name(Name::from_str(domain).unwrap());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(id, MessageType::Query, OpCode::Query);
    message.metadata.recursion_desired = true;
    message.add_query(query);

    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder).unwrap();
    buf
}

pub fn query(id: u16, domain: &str, transport: Transport) -> ReplayQuery {
    let mut query = ReplayQuery::new();
    query.set_transport(transport).unwrap();
    query.set_raw(&query_bytes(id, domain)).unwrap();
    query
}

pub fn pool_config(target: SocketAddr) -> ClientPoolConfig {
    let mut config = ClientPoolConfig::new(target.ip().to_string());
    config.target_service = target.port().to_string();
    config.client_ttl = 0.5;
    config.retry_interval_ms = 20;
    config
}
