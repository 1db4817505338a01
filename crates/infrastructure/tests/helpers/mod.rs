#![allow(dead_code)]
pub mod dns_responder;
pub mod fixtures;

pub use dns_responder::{closed_port, TcpResponder, UdpResponder};
pub use fixtures::{pool_config, query, query_bytes, LONG_NAME};
