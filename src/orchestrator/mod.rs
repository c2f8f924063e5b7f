pub mod engine;
pub mod phases;

pub use engine::{ChapterOutcome, Orchestrator, RunReport, RunStatus};
pub use phases::{PhaseDef, SchedulingPolicy, schedule};
