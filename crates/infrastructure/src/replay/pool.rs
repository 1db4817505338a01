use dnsreplay_application::ports::QueryDispatcher;
use dnsreplay_domain::{ClientPoolConfig, DomainError, Query};
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::engine::{Engine, EngineSettings, PoolShared};
use super::queue::PushError;
use super::stats::EngineSnapshot;
use super::target::resolve_target;

/// How long a producer blocks on a full queue before trying again.
const ENQUEUE_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Inactive,
    Running,
    Stopped,
    Error,
}

impl PoolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolState::Inactive => "inactive",
            PoolState::Running => "running",
            PoolState::Stopped => "stopped",
            PoolState::Error => "error",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Lifecycle {
    state: PoolState,
    engine: Option<JoinHandle<()>>,
}

/// Closes the queue when the engine thread exits, even by unwinding, so
/// producers blocked on a full queue are released.
struct CloseOnExit(Arc<PoolShared>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.queue.close();
    }
}

/// Thread-safe handle to one replay engine.
///
/// Any number of producer threads may [`enqueue`](ClientPool::enqueue)
/// queries; a dedicated engine thread sends them to the target over a bounded
/// set of concurrent connections.
pub struct ClientPool {
    settings: Arc<EngineSettings>,
    shared: Arc<PoolShared>,
    addresses: Vec<SocketAddr>,
    lifecycle: Mutex<Lifecycle>,
}

impl ClientPool {
    /// Resolves the target and prepares an inactive pool.
    pub fn new(config: &ClientPoolConfig) -> Result<Self, DomainError> {
        let addresses = resolve_target(&config.target_host, &config.target_service)?;
        Self::with_addresses(config, addresses)
    }

    /// Prepares an inactive pool for already resolved addresses. The first
    /// address is the one queries are sent to.
    pub fn with_addresses(
        config: &ClientPoolConfig,
        addresses: Vec<SocketAddr>,
    ) -> Result<Self, DomainError> {
        let Some(&target) = addresses.first() else {
            return Err(DomainError::NoTargetAddress(config.target_host.clone()));
        };

        let settings = EngineSettings {
            target,
            max_clients: config.max_clients.max(1),
            client_ttl: config.client_ttl(),
            max_reuse_clients: config.max_reuse_clients,
            send_as: config.send_as,
            skip_reply: config.skip_reply,
            retry_interval: config.retry_interval(),
        };

        debug!(
            target: "core",
            target_addr = %target,
            addresses = addresses.len(),
            max_clients = settings.max_clients,
            "client pool created"
        );

        Ok(Self {
            settings: Arc::new(settings),
            shared: Arc::new(PoolShared::new(config.queue_capacity.max(1))),
            addresses,
            lifecycle: Mutex::new(Lifecycle {
                state: PoolState::Inactive,
                engine: None,
            }),
        })
    }

    pub fn state(&self) -> PoolState {
        self.lifecycle.lock().state
    }

    pub fn target(&self) -> SocketAddr {
        self.settings.target
    }

    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Queries waiting for the engine.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn stats(&self) -> EngineSnapshot {
        self.shared.stats.snapshot()
    }

    /// Spawns the engine thread. Only valid on an inactive pool.
    pub fn start(&self) -> Result<(), DomainError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != PoolState::Inactive {
            return Err(DomainError::InvalidPoolState {
                expected: PoolState::Inactive.as_str(),
                actual: lifecycle.state.as_str(),
            });
        }

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                lifecycle.state = PoolState::Error;
                return Err(DomainError::EngineStart(e.to_string()));
            }
        };

        let settings = Arc::clone(&self.settings);
        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("replay-engine".to_string())
            .spawn(move || {
                let _close = CloseOnExit(Arc::clone(&shared));
                runtime.block_on(Engine::new(settings, shared).run());
            });

        match spawned {
            Ok(handle) => {
                lifecycle.engine = Some(handle);
                lifecycle.state = PoolState::Running;
                info!(target: "core", target_addr = %self.settings.target, "client pool started");
                Ok(())
            }
            Err(e) => {
                lifecycle.state = PoolState::Error;
                Err(DomainError::EngineStart(e.to_string()))
            }
        }
    }

    /// Hands a query to the engine, blocking while the queue is full.
    pub fn enqueue(&self, query: Query) -> Result<(), DomainError> {
        let state = self.state();
        if state != PoolState::Running {
            return Err(DomainError::InvalidPoolState {
                expected: PoolState::Running.as_str(),
                actual: state.as_str(),
            });
        }

        let mut pending = query;
        loop {
            match self.shared.queue.push_timeout(pending, ENQUEUE_RETRY) {
                Ok(()) => break,
                Err(PushError::Closed(_)) => return Err(DomainError::QueueClosed),
                Err(err) => {
                    debug!(target: "core", queued = self.shared.queue.len(), "query queue full, waiting");
                    pending = err.into_inner();
                }
            }
        }

        self.shared.wake.notify_one();
        Ok(())
    }

    /// Signals the engine to finish the queued work and waits for its thread.
    ///
    /// Stopping an already stopped pool is a no-op.
    pub fn stop(&self) -> Result<(), DomainError> {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            PoolState::Stopped => return Ok(()),
            PoolState::Running => {}
            other => {
                return Err(DomainError::InvalidPoolState {
                    expected: PoolState::Running.as_str(),
                    actual: other.as_str(),
                })
            }
        }

        info!(target: "core", queued = self.shared.queue.len(), "client pool stopping");
        self.shared.shutdown.cancel();

        let joined = lifecycle.engine.take().map(JoinHandle::join);
        if let Some(Err(_)) = joined {
            lifecycle.state = PoolState::Error;
            return Err(DomainError::EngineCrashed);
        }

        lifecycle.state = PoolState::Stopped;
        info!(target: "core", "client pool stopped");
        Ok(())
    }

    /// Discards undelivered queries. Returns how many were dropped.
    pub fn destroy(&self) -> Result<usize, DomainError> {
        let state = self.state();
        if state == PoolState::Running {
            return Err(DomainError::InvalidPoolState {
                expected: PoolState::Stopped.as_str(),
                actual: state.as_str(),
            });
        }

        self.shared.queue.close();
        let flushed = self.shared.queue.flush();
        if flushed > 0 {
            warn!(target: "core", flushed, "discarded undelivered queries");
        }
        Ok(flushed)
    }
}

impl QueryDispatcher for ClientPool {
    fn dispatch(&self, query: Query) -> Result<(), DomainError> {
        self.enqueue(query)
    }
}

impl Drop for ClientPool {
    fn drop(&mut self) {
        if self.state() == PoolState::Running {
            if let Err(e) = self.stop() {
                warn!(target: "core", error = %e, "client pool did not stop cleanly");
            }
        }
    }
}

impl fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("target", &self.settings.target)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .finish()
    }
}
