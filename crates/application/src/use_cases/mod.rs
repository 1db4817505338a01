pub mod intake_stats;
pub mod replay_intake;
pub mod replay_source;

pub use intake_stats::{IntakeSnapshot, IntakeStats};
pub use replay_intake::{DropReason, IntakeOutcome, ReplayIntake};
pub use replay_source::{ReplaySourceUseCase, SourceReport};
