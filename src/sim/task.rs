//! Task model for the simulated host.
//!
//! Each simulated task has a scripted behavior (a sequence of phases) and
//! owns the [`Task`] entity handed to the engine callbacks.

use crate::task::Task;
use crate::types::{CgroupId, CpuId, Pid, TimeNs};

/// A phase in a task's scripted behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Run (consume CPU) for the given number of nanoseconds.
    Run(TimeNs),
    /// Sleep (block) for the given number of nanoseconds.
    Sleep(TimeNs),
}

/// How a task's phase sequence repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// Run the phase sequence exactly once and exit.
    Once,
    /// Repeat the phase sequence a fixed number of times, then exit.
    Count(u32),
    /// Repeat the phase sequence indefinitely (until the scenario ends).
    Forever,
}

/// The scripted behavior for a task: a sequence of phases with a repeat mode.
#[derive(Debug, Clone)]
pub struct TaskBehavior {
    pub phases: Vec<Phase>,
    pub repeat: RepeatMode,
}

impl TaskBehavior {
    /// A behavior that runs its phases once and exits.
    pub fn once(phases: Vec<Phase>) -> Self {
        TaskBehavior {
            phases,
            repeat: RepeatMode::Once,
        }
    }

    /// A behavior that repeats its phases until the scenario ends.
    pub fn forever(phases: Vec<Phase>) -> Self {
        TaskBehavior {
            phases,
            repeat: RepeatMode::Forever,
        }
    }
}

/// Definition of a task for scenario creation.
#[derive(Debug, Clone)]
pub struct TaskDef {
    pub name: String,
    pub pid: Pid,
    /// The priority domain the task belongs to.
    pub cgroup_id: CgroupId,
    /// Where the host initially places the task.
    pub cpu: CpuId,
    pub behavior: TaskBehavior,
    /// When the task first becomes runnable (simulated ns).
    pub start_time_ns: TimeNs,
}

/// The state a simulated task can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not runnable.
    Sleeping,
    /// Runnable but not currently executing on any CPU.
    Runnable,
    /// Currently executing on the given CPU.
    Running { cpu: CpuId },
    /// Completed all its phases.
    Exited,
}

/// A simulated task at runtime.
pub struct SimTask {
    /// The schedulable entity seen by the engine callbacks.
    pub task: Task,
    pub name: String,
    pub behavior: TaskBehavior,
    /// Current phase index.
    pub phase_idx: usize,
    /// Repeat iteration (0-based), incremented each time the phase
    /// sequence wraps back to the beginning.
    pub repeat_iteration: u32,
    /// Remaining nanoseconds in the current Run phase (only meaningful
    /// when the current phase is `Phase::Run`).
    pub run_remaining_ns: TimeNs,
    pub state: TaskState,
    /// Whether `enable` has been called for this task.
    pub enabled: bool,
}

impl SimTask {
    pub fn new(def: &TaskDef) -> Self {
        let mut task = Task::new(def.pid, def.cgroup_id);
        task.cpu = def.cpu;

        let run_remaining_ns = match def.behavior.phases.first() {
            Some(Phase::Run(ns)) => *ns,
            _ => 0,
        };

        SimTask {
            task,
            name: def.name.clone(),
            behavior: def.behavior.clone(),
            phase_idx: 0,
            repeat_iteration: 0,
            run_remaining_ns,
            state: TaskState::Sleeping,
            enabled: false,
        }
    }

    /// The current phase, or None if the task has completed all phases.
    pub fn current_phase(&self) -> Option<&Phase> {
        self.behavior.phases.get(self.phase_idx)
    }

    /// Advance to the next phase. Returns true if there is a next phase.
    pub fn advance_phase(&mut self) -> bool {
        self.phase_idx += 1;
        if self.phase_idx >= self.behavior.phases.len() {
            match self.behavior.repeat {
                RepeatMode::Once => return false,
                RepeatMode::Forever => {
                    self.phase_idx = 0;
                    self.repeat_iteration += 1;
                }
                RepeatMode::Count(n) => {
                    self.repeat_iteration += 1;
                    if self.repeat_iteration >= n {
                        return false;
                    }
                    self.phase_idx = 0;
                }
            }
        }
        // Reset run_remaining for the new phase
        match self.current_phase() {
            Some(Phase::Run(ns)) => self.run_remaining_ns = *ns,
            _ => self.run_remaining_ns = 0,
        }
        true
    }
}
