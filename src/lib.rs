//! `scx_cgboost`: a weighted virtual-time scheduler that favors tasks
//! belonging to explicitly boosted cgroups.
//!
//! Tasks accrue virtual runtime inversely proportional to their weight, so
//! a task in a boosted cgroup is charged a fraction of its real CPU time
//! and keeps winning the lowest-vtime dispatch race. Tasks outside any
//! boosted cgroup accrue at the normal rate. The policy degrades to plain
//! vtime round-robin when no cgroup is boosted.
//!
//! The [`Scheduler`] exposes the callback surface a host drives: task
//! wakeups flow through [`Scheduler::select_unit`] and
//! [`Scheduler::enqueue`], idle CPUs call [`Scheduler::dispatch`], and
//! every stretch of execution is bracketed by [`Scheduler::running`] and
//! [`Scheduler::stopping`]. The [`sim`] module provides a deterministic
//! host for exercising the policy against synthetic workloads.
//!
//! ```
//! use scx_cgboost::{CgroupId, CpuId, Pid, Scheduler, SchedulerConfig, Task};
//!
//! let sched = Scheduler::init(SchedulerConfig::default()).unwrap();
//! sched.registry().insert(CgroupId(42)).unwrap();
//!
//! let mut task = Task::new(Pid(1), CgroupId(42));
//! sched.enable(&mut task);
//! sched.enqueue(&task);
//!
//! let next = sched.dispatch(CpuId(0)).unwrap();
//! assert_eq!(next.pid, Pid(1));
//!
//! // Run for a full slice: a boosted task is charged a quarter of it.
//! sched.running(&task, 0);
//! sched.stopping(&mut task, next.slice_ns, true);
//! assert_eq!(task.vtime.0, next.slice_ns / 4);
//! ```

pub mod clock;
pub mod dsq;
pub mod exit;
pub mod registry;
pub mod sched;
pub mod sim;
pub mod stats;
pub mod task;
pub mod types;

/// Name used in log and stats output.
pub const SCHEDULER_NAME: &str = "CgBoost";

pub use clock::VirtualClock;
pub use dsq::{Dsq, DsqSet, QueuedTask, DEFAULT_MAX_DSQS};
pub use exit::{ExitInfo, ExitKind};
pub use registry::{PriorityRegistry, DEFAULT_MAX_BOOSTED};
pub use sched::{
    SchedState, Scheduler, SchedulerConfig, DEFAULT_BOOST_RATIO, DEFAULT_SLICE_NS, NORMAL_WEIGHT,
};
pub use sim::{
    parse_duration_ns, Phase, RepeatMode, Scenario, ScenarioBuilder, Simulator, TaskBehavior,
    TaskDef, Trace, TraceEvent, TraceKind,
};
pub use stats::Metrics;
pub use task::{Task, TaskCtx, TaskStore, DEFAULT_MAX_TASK_CTXS};
pub use types::{CgroupId, CpuId, Pid, TimeNs, Vtime};
