//! Deterministic simulation of the scheduler against synthetic workloads.
//!
//! A [`Scenario`] describes tasks as sequences of Run/Sleep phases; the
//! [`Simulator`] replays them on a virtual host, invoking the engine's
//! callbacks in the same order a real host would, and produces a [`Trace`]
//! that tests and the CLI can inspect.

pub mod engine;
pub mod scenario;
pub mod task;
pub mod trace;

pub use engine::Simulator;
pub use scenario::{parse_duration_ns, Scenario, ScenarioBuilder};
pub use task::{Phase, RepeatMode, TaskBehavior, TaskDef, TaskState};
pub use trace::{Trace, TraceEvent, TraceKind};
