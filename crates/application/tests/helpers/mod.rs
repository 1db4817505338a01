#![allow(dead_code)]

mod fixtures;
mod manual_clock;
mod mock_dispatcher;

pub use fixtures::{packet, query_bytes, response_bytes};
pub use manual_clock::ManualClock;
pub use mock_dispatcher::MockDispatcher;
