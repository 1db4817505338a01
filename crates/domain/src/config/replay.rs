use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// How many times the inputs are replayed.
    #[serde(default = "default_iterations")]
    pub iterations: u64,

    /// Replay the inputs until interrupted, ignoring `iterations`.
    #[serde(default)]
    pub loop_forever: bool,

    /// Run the intake without sending anything.
    #[serde(default)]
    pub dry_run: bool,

    /// Number of independent client pools queries are spread across.
    #[serde(default = "default_client_pools")]
    pub client_pools: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            loop_forever: false,
            dry_run: false,
            client_pools: default_client_pools(),
        }
    }
}

fn default_iterations() -> u64 {
    1
}

fn default_client_pools() -> usize {
    1
}
