//! dnsreplay domain layer
pub mod capture;
pub mod config;
pub mod dns_header;
pub mod errors;
pub mod query;
pub mod timespec;
pub mod timing;
pub mod transport;

pub use capture::CapturedPacket;
pub use config::{CliOverrides, ClientPoolConfig, Config, ConfigError};
pub use dns_header::MessageKind;
pub use errors::DomainError;
pub use query::Query;
pub use timespec::Timespec;
pub use timing::TimingMode;
pub use transport::{SendAs, Transport};
