//! Use cases built on the domain and infrastructure layers.

pub mod diff;
pub mod orchestrator;
pub mod scheduler;

pub use diff::{plan_update, ChangePolicy};
pub use orchestrator::{Orchestrator, RunError, RunSettings, RunSummary};
pub use scheduler::{JobError, JobHandle, Scheduler};
