pub mod active_list;
pub mod connection;
mod engine;
pub mod pool;
pub mod queue;
pub mod stats;
pub mod target;

pub use connection::{Connection, ConnectionState, Progress, Readiness};
pub use pool::{ClientPool, PoolState};
pub use queue::{BoundedQueue, PopOutcome, PushError};
pub use stats::{EngineSnapshot, EngineStats};
pub use target::resolve_target;
