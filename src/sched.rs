//! The scheduling engine.
//!
//! Tasks accumulate virtual runtime (vtime) as they execute and the task
//! with the lowest vtime in a queue is dispatched first. Accrual is scaled
//! by weight: a task whose cgroup is in the [`PriorityRegistry`] is charged
//! `1 / boost_ratio` of its measured runtime, so boosted cgroups receive a
//! proportionally larger CPU share while everyone keeps making progress.
//!
//! The engine is passive. A host (kernel shim, test harness, simulator)
//! owns the tasks and drives the callbacks: `select_unit` on wakeup,
//! `enqueue` when a task needs a queue, `dispatch` when a CPU wants work,
//! `running`/`stopping` around every stretch of execution and `enable` when
//! a task first joins the policy. All callbacks are constant-time and safe
//! to call from concurrent host contexts.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use log::info;

use crate::clock::VirtualClock;
use crate::dsq::{DsqSet, QueuedTask, DEFAULT_MAX_DSQS};
use crate::exit::{ExitInfo, ExitKind};
use crate::registry::{PriorityRegistry, DEFAULT_MAX_BOOSTED};
use crate::stats::{Counters, Metrics};
use crate::task::{Task, TaskStore, DEFAULT_MAX_TASK_CTXS};
use crate::types::{CpuId, Pid, TimeNs, Vtime};

/// Weight of a task in a non-boosted cgroup, and the numerator of every
/// vtime scaling.
pub const NORMAL_WEIGHT: u64 = 1024;

/// Default execution slice handed out with every dispatched task.
pub const DEFAULT_SLICE_NS: TimeNs = 10_000_000;

/// Default boost factor: boosted tasks are charged 1/4 of their runtime.
pub const DEFAULT_BOOST_RATIO: u64 = 4;

/// Tunables fixed at initialization.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of processing units to create dispatch queues for.
    pub nr_cpus: u32,
    /// Execution slice attached to every dispatched task.
    pub slice_ns: TimeNs,
    /// Weight multiplier for boosted cgroups. Must be at least 1.
    pub boost_ratio: u64,
    /// Capacity of the priority registry.
    pub max_boosted: usize,
    /// Capacity of the task context store.
    pub max_task_ctxs: usize,
    /// Maximum number of dispatch queues the host allows.
    pub max_dsqs: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            nr_cpus: 1,
            slice_ns: DEFAULT_SLICE_NS,
            boost_ratio: DEFAULT_BOOST_RATIO,
            max_boosted: DEFAULT_MAX_BOOSTED,
            max_task_ctxs: DEFAULT_MAX_TASK_CTXS,
            max_dsqs: DEFAULT_MAX_DSQS,
        }
    }
}

/// Lifecycle of an initialized engine.
///
/// `init()` performs the transition out of the implicit uninitialized
/// state: a `Scheduler` value only exists once every dispatch queue has
/// been created, so a failed initialization leaves nothing half-active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedState {
    /// Processing callbacks.
    Active,
    /// An exit has been recorded; callbacks are ignored.
    Exiting,
    /// Torn down.
    Stopped,
}

impl SchedState {
    fn from_u8(v: u8) -> SchedState {
        match v {
            0 => SchedState::Active,
            1 => SchedState::Exiting,
            _ => SchedState::Stopped,
        }
    }
}

/// The weighted virtual-time scheduling engine.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<PriorityRegistry>,
    tasks: TaskStore,
    vclock: VirtualClock,
    dsqs: DsqSet,
    state: AtomicU8,
    exit_info: Mutex<ExitInfo>,
    counters: Counters,
}

impl Scheduler {
    /// Validate the configuration, create one dispatch queue per CPU and
    /// activate the engine.
    ///
    /// Queue creation is all-or-nothing: if any queue is refused by the
    /// host limit, the error is returned and everything already built is
    /// dropped with it.
    pub fn init(config: SchedulerConfig) -> Result<Self> {
        if config.nr_cpus == 0 {
            bail!("at least one CPU is required");
        }
        if config.boost_ratio == 0 {
            bail!("priority boost ratio must be at least 1");
        }

        let mut dsqs = DsqSet::new(config.max_dsqs);
        for cpu in 0..config.nr_cpus {
            if let Err(err) = dsqs.create(CpuId(cpu)) {
                bail!("failed to create dispatch queue for CPU {}: {}", cpu, err);
            }
        }

        info!(
            "scheduler active: {} CPUs, slice {}ns, boost ratio {}x",
            config.nr_cpus, config.slice_ns, config.boost_ratio
        );

        Ok(Scheduler {
            registry: Arc::new(PriorityRegistry::new(config.max_boosted)),
            tasks: TaskStore::new(config.max_task_ctxs),
            vclock: VirtualClock::new(),
            dsqs,
            state: AtomicU8::new(SchedState::Active as u8),
            exit_info: Mutex::new(ExitInfo::default()),
            counters: Counters::default(),
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Shared handle to the priority registry. Hosts mark and unmark
    /// boosted cgroups through this at any time.
    pub fn registry(&self) -> Arc<PriorityRegistry> {
        self.registry.clone()
    }

    pub fn state(&self) -> SchedState {
        SchedState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_active(&self) -> bool {
        self.state() == SchedState::Active
    }

    /// Pick the CPU a waking task should be queued on.
    ///
    /// Soft affinity: stay where the task last ran. The host is free to
    /// override this; it is a hint, not a reservation.
    pub fn select_unit(&self, _task: &Task, prev_cpu: CpuId) -> CpuId {
        prev_cpu
    }

    /// Insert a runnable task into the dispatch queue of its CPU, ordered
    /// by its current vtime.
    pub fn enqueue(&self, task: &Task) {
        if !self.is_active() {
            return;
        }
        let queued = QueuedTask {
            pid: task.pid,
            slice_ns: self.config.slice_ns,
        };
        if self.dsqs.insert_vtime(task.cpu, queued, task.vtime) {
            Counters::inc(&self.counters.nr_enqueues);
        }
    }

    /// Hand the CPU the queued task with the lowest vtime, if any.
    pub fn dispatch(&self, cpu: CpuId) -> Option<QueuedTask> {
        if !self.is_active() {
            return None;
        }
        match self.dsqs.pop(cpu) {
            Some(task) => {
                Counters::inc(&self.counters.nr_dispatches);
                Some(task)
            }
            None => {
                Counters::inc(&self.counters.nr_idle_dispatches);
                None
            }
        }
    }

    /// A task starts executing at host time `now`.
    ///
    /// Records the start timestamp and advances the global virtual clock
    /// to the task's vtime. If no context can be allocated for the task,
    /// the event is dropped and only the accounting for this stretch is
    /// lost; the task itself keeps running.
    pub fn running(&self, task: &Task, now: TimeNs) {
        if !self.is_active() {
            return;
        }
        match self.tasks.lookup_or_create(task.pid) {
            Some(mut ctx) => ctx.last_run_at = Some(now),
            None => {
                Counters::inc(&self.counters.nr_ctx_alloc_fails);
                return;
            }
        }
        self.vclock.advance_to(task.vtime);
    }

    /// A task stops executing at host time `now`.
    ///
    /// Charges the measured runtime to the task's vtime, scaled by the
    /// weight of its cgroup. Without a matching `running` timestamp the
    /// event is ignored, and a clock that reads earlier than the recorded
    /// start charges zero rather than rewinding the task.
    pub fn stopping(&self, task: &mut Task, now: TimeNs, _runnable: bool) {
        if !self.is_active() {
            return;
        }
        let started = match self.tasks.lookup_or_create(task.pid) {
            Some(mut ctx) => ctx.last_run_at.take(),
            None => {
                Counters::inc(&self.counters.nr_ctx_alloc_fails);
                return;
            }
        };
        let Some(started) = started else {
            return;
        };

        if now < started {
            Counters::inc(&self.counters.nr_zero_deltas);
        }
        let delta_exec = now.saturating_sub(started);
        let delta_vruntime = delta_exec * NORMAL_WEIGHT / self.task_weight(task);
        task.vtime = task.vtime.advance(delta_vruntime);
    }

    /// A task joins the policy.
    ///
    /// Its vtime is raised to at most one slice behind the global clock,
    /// so a newcomer (or a long sleeper being re-enabled) gets a bounded
    /// head start instead of monopolizing the CPU on banked idle time.
    pub fn enable(&self, task: &mut Task) {
        if !self.is_active() {
            return;
        }
        let floor = Vtime(self.vclock.now().0.saturating_sub(self.config.slice_ns));
        if task.vtime < floor {
            task.vtime = floor;
            Counters::inc(&self.counters.nr_clamped_enables);
        }
    }

    /// A task left the host for good; drop its accounting context.
    pub fn exit_task(&self, task: &Task) {
        self.tasks.remove(task.pid);
    }

    /// Record an exit and stop processing callbacks. Only the first exit
    /// is kept; later calls are ignored.
    pub fn exit(&self, kind: ExitKind, reason: &str) {
        let mut info = self
            .exit_info
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if info.kind() != ExitKind::None {
            return;
        }
        *info = ExitInfo::new(kind, reason);
        self.state.store(SchedState::Exiting as u8, Ordering::SeqCst);
        info!("scheduler exiting: {}", reason);
    }

    /// Tear the engine down, releasing every queue and context, and return
    /// the recorded exit reason. A shutdown with no prior `exit` counts as
    /// a plain unregistration.
    pub fn shutdown(self) -> ExitInfo {
        self.state.store(SchedState::Stopped as u8, Ordering::SeqCst);
        let info = self
            .exit_info
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if info.kind() == ExitKind::None {
            ExitInfo::new(ExitKind::Unreg, "scheduler unregistered")
        } else {
            info
        }
    }

    /// Snapshot counters and gauges.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            nr_queued: self.dsqs.nr_queued_total() as u64,
            nr_task_ctxs: self.tasks.len() as u64,
            nr_boosted_cgroups: self.registry.len() as u64,
            vtime_now: self.vclock.now().0,
            ..Metrics::from_counters(&self.counters)
        }
    }

    /// Current value of the global virtual clock.
    pub fn vtime_now(&self) -> Vtime {
        self.vclock.now()
    }

    /// Number of tasks waiting on a CPU's queue.
    pub fn nr_queued(&self, cpu: CpuId) -> usize {
        self.dsqs.nr_queued(cpu)
    }

    /// Pids waiting on a CPU's queue, in dispatch order.
    pub fn queued_pids(&self, cpu: CpuId) -> Vec<Pid> {
        self.dsqs.ordered_pids(cpu)
    }

    fn task_weight(&self, task: &Task) -> u64 {
        if self.registry.is_boosted(task.cgroup_id) {
            NORMAL_WEIGHT * self.config.boost_ratio
        } else {
            NORMAL_WEIGHT
        }
    }
}
