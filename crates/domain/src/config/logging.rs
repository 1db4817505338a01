use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Level override for the `core` facility (intake, pool lifecycle).
    #[serde(default)]
    pub core: Option<String>,

    /// Level override for the `network` facility (engine, connections).
    #[serde(default)]
    pub network: Option<String>,
}

impl LoggingConfig {
    /// Builds an `EnvFilter`-style directive string, e.g. `info,network=debug`.
    ///
    /// Unknown levels are passed through untouched; `validate` rejects them
    /// before this is called.
    pub fn filter_directives(&self) -> String {
        let mut directives = tracing_level(&self.level)
            .unwrap_or(&self.level)
            .to_string();
        for (facility, level) in [("core", &self.core), ("network", &self.network)] {
            if let Some(level) = level {
                directives.push_str(&format!(
                    ",{}={}",
                    facility,
                    tracing_level(level).unwrap_or(level)
                ));
            }
        }
        directives
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            core: None,
            network: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Maps a syslog-flavoured level name onto the nearest tracing level.
pub fn tracing_level(level: &str) -> Option<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" | "notice" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" => Some("error"),
        "off" | "none" => Some("off"),
        _ => None,
    }
}
