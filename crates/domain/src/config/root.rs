use serde::{Deserialize, Serialize};
use std::path::Path;

use super::client_pool::{
    service_port, ClientPoolConfig, MAX_CLIENT_TTL_SECS, MAX_RETRY_INTERVAL_MS,
};
use super::errors::ConfigError;
use super::logging::{tracing_level, LoggingConfig};
use super::replay::ReplayConfig;
use crate::{SendAs, TimingMode};

const LOCAL_CONFIG: &str = "dnsreplay.toml";
const SYSTEM_CONFIG: &str = "/etc/dnsreplay/config.toml";

/// Main configuration structure for dnsreplay
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Target and connection limits of every client pool
    pub client_pool: ClientPoolConfig,

    /// Pacing policy
    pub timing: TimingMode,

    /// Replay loop settings
    pub replay: ReplayConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. dnsreplay.toml in current directory
    /// 3. /etc/dnsreplay/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if Path::new(LOCAL_CONFIG).exists() {
            Self::from_file(LOCAL_CONFIG)?
        } else if Path::new(SYSTEM_CONFIG).exists() {
            Self::from_file(SYSTEM_CONFIG)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply command-line overrides to configuration
    pub fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(host) = overrides.target_host {
            self.client_pool.target_host = host;
        }
        if let Some(service) = overrides.target_service {
            self.client_pool.target_service = service;
        }
        if let Some(max_clients) = overrides.max_clients {
            self.client_pool.max_clients = max_clients;
        }
        if let Some(send_as) = overrides.send_as {
            self.client_pool.send_as = send_as;
        }
        if overrides.skip_reply {
            self.client_pool.skip_reply = true;
        }
        if let Some(timing) = overrides.timing {
            self.timing = timing;
        }
        if let Some(iterations) = overrides.iterations {
            self.replay.iterations = iterations;
        }
        if overrides.loop_forever {
            self.replay.loop_forever = true;
        }
        if overrides.dry_run {
            self.replay.dry_run = true;
        }
        if let Some(pools) = overrides.client_pools {
            self.replay.client_pools = pools;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pool = &self.client_pool;

        if pool.target_host.trim().is_empty() && !self.replay.dry_run {
            return Err(ConfigError::Validation(
                "No target host configured".to_string(),
            ));
        }
        service_port(&pool.target_service)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if pool.max_clients == 0 {
            return Err(ConfigError::Validation(
                "max_clients must be at least 1".to_string(),
            ));
        }
        if !pool.client_ttl.is_finite() || pool.client_ttl <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "client_ttl must be a positive number of seconds, got {}",
                pool.client_ttl
            )));
        }
        if pool.client_ttl > MAX_CLIENT_TTL_SECS {
            return Err(ConfigError::Validation(format!(
                "client_ttl must not exceed {} seconds, got {}",
                MAX_CLIENT_TTL_SECS, pool.client_ttl
            )));
        }
        if pool.retry_interval_ms > MAX_RETRY_INTERVAL_MS {
            return Err(ConfigError::Validation(format!(
                "retry_interval_ms must not exceed {}, got {}",
                MAX_RETRY_INTERVAL_MS, pool.retry_interval_ms
            )));
        }
        if pool.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "queue_capacity must be at least 1".to_string(),
            ));
        }

        if let TimingMode::Multiply { factor } = self.timing {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "timing multiply factor must be positive, got {}",
                    factor
                )));
            }
        }

        if self.replay.client_pools == 0 {
            return Err(ConfigError::Validation(
                "client_pools must be at least 1".to_string(),
            ));
        }
        if self.replay.iterations == 0 && !self.replay.loop_forever {
            return Err(ConfigError::Validation(
                "iterations must be at least 1".to_string(),
            ));
        }

        let levels = [
            Some(&self.logging.level),
            self.logging.core.as_ref(),
            self.logging.network.as_ref(),
        ];
        for level in levels.into_iter().flatten() {
            if tracing_level(level).is_none() {
                return Err(ConfigError::Validation(format!(
                    "Unknown log level '{}'",
                    level
                )));
            }
        }

        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub target_host: Option<String>,
    pub target_service: Option<String>,
    pub max_clients: Option<usize>,
    pub send_as: Option<SendAs>,
    pub skip_reply: bool,
    pub timing: Option<TimingMode>,
    pub iterations: Option<u64>,
    pub loop_forever: bool,
    pub dry_run: bool,
    pub client_pools: Option<usize>,
    pub log_level: Option<String>,
}
