//! dnsreplay infrastructure layer
pub mod capture;
pub mod clock;
pub mod replay;
