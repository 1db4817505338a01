use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{DomainError, SendAs};

pub const DEFAULT_DNS_PORT: u16 = 53;

/// Longest accepted `client_ttl`, in seconds.
pub const MAX_CLIENT_TTL_SECS: f64 = 86_400.0;

/// Longest accepted `retry_interval_ms`.
pub const MAX_RETRY_INTERVAL_MS: u64 = 3_600_000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientPoolConfig {
    #[serde(default)]
    pub target_host: String,

    /// Port number, or `domain` / `dns` for port 53. Other service names
    /// are not looked up in the services database and fail validation.
    #[serde(default = "default_target_service")]
    pub target_service: String,

    /// Maximum number of active connections.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Seconds a connection may stay active before it is reaped, at most
    /// [`MAX_CLIENT_TTL_SECS`].
    #[serde(default = "default_client_ttl")]
    pub client_ttl: f64,

    /// Maximum number of idle UDP connections kept for reuse. 0 disables reuse.
    #[serde(default)]
    pub max_reuse_clients: usize,

    #[serde(default)]
    pub send_as: SendAs,

    #[serde(default)]
    pub skip_reply: bool,

    /// Delay before a query whose connect failed is tried again, at most
    /// [`MAX_RETRY_INTERVAL_MS`].
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl ClientPoolConfig {
    pub fn new(target_host: impl Into<String>) -> Self {
        Self {
            target_host: target_host.into(),
            ..Self::default()
        }
    }

    /// Out of range values fall back to the default; `validate` rejects them.
    pub fn client_ttl(&self) -> Duration {
        Duration::try_from_secs_f64(self.client_ttl.min(MAX_CLIENT_TTL_SECS))
            .unwrap_or_else(|_| Duration::from_secs_f64(default_client_ttl()))
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.min(MAX_RETRY_INTERVAL_MS))
    }

    /// Resolves `target_service` to a port number.
    pub fn target_port(&self) -> Result<u16, DomainError> {
        service_port(&self.target_service)
    }
}

impl Default for ClientPoolConfig {
    fn default() -> Self {
        Self {
            target_host: String::new(),
            target_service: default_target_service(),
            max_clients: default_max_clients(),
            client_ttl: default_client_ttl(),
            max_reuse_clients: 0,
            send_as: SendAs::Original,
            skip_reply: false,
            retry_interval_ms: default_retry_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

pub fn service_port(service: &str) -> Result<u16, DomainError> {
    if let Ok(port) = service.parse::<u16>() {
        return Ok(port);
    }
    match service.to_ascii_lowercase().as_str() {
        "domain" | "dns" => Ok(DEFAULT_DNS_PORT),
        _ => Err(DomainError::UnknownService(service.to_string())),
    }
}

fn default_target_service() -> String {
    DEFAULT_DNS_PORT.to_string()
}

fn default_max_clients() -> usize {
    100
}

fn default_client_ttl() -> f64 {
    0.05
}

fn default_retry_interval_ms() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    0x200
}
