pub mod client_pool;
pub mod errors;
pub mod logging;
pub mod replay;
pub mod root;

pub use client_pool::ClientPoolConfig;
pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use replay::ReplayConfig;
pub use root::{CliOverrides, Config};
