use dnsreplay_application::ports::QueryDispatcher;
use dnsreplay_domain::Config;
use dnsreplay_infrastructure::replay::{ClientPool, EngineSnapshot};
use std::sync::Arc;
use tracing::{error, info};

/// The running client pools of one replay.
pub struct ClientPools {
    pools: Vec<Arc<ClientPool>>,
}

impl ClientPools {
    /// Creates and starts `client_pools` pools. A dry run starts none.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        if config.replay.dry_run {
            info!(target: "core", "Dry run, no client pools started");
            return Ok(Self { pools: Vec::new() });
        }

        let mut pools = Vec::with_capacity(config.replay.client_pools);
        for index in 0..config.replay.client_pools {
            let pool = Arc::new(ClientPool::new(&config.client_pool)?);
            pool.start()?;
            info!(
                target: "core",
                pool = index,
                target_addr = %pool.target(),
                max_clients = config.client_pool.max_clients,
                "Client pool ready"
            );
            pools.push(pool);
        }

        Ok(Self { pools })
    }

    pub fn dispatchers(&self) -> Vec<Arc<dyn QueryDispatcher>> {
        self.pools
            .iter()
            .map(|pool| Arc::clone(pool) as Arc<dyn QueryDispatcher>)
            .collect()
    }

    /// Drains and stops every pool, then sums their counters.
    pub fn shutdown(self) -> anyhow::Result<EngineSnapshot> {
        let mut total = EngineSnapshot::default();
        let mut failed = 0;

        for (index, pool) in self.pools.iter().enumerate() {
            if let Err(e) = pool.stop() {
                error!(target: "core", pool = index, error = %e, "Client pool did not stop cleanly");
                failed += 1;
            }
            match pool.destroy() {
                Ok(flushed) => total.lost += flushed as u64,
                Err(e) => error!(target: "core", pool = index, error = %e, "Unable to destroy client pool"),
            }
            total.merge(&pool.stats());
        }

        if failed > 0 {
            anyhow::bail!("{} client pool(s) failed", failed);
        }
        Ok(total)
    }
}
