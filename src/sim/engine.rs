//! Event-driven host for exercising the scheduling engine.
//!
//! The simulator owns the tasks and CPUs and drives the engine through its
//! callbacks exactly the way a real host would: a waking task gets a unit
//! via `select_unit` and is enqueued, an idle CPU dispatches, and every
//! stretch of execution is bracketed by `running`/`stopping`. Events are
//! processed in (time, seq) order, so runs are fully deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::dsq::QueuedTask;
use crate::exit::ExitKind;
use crate::sched::Scheduler;
use crate::sim::scenario::Scenario;
use crate::sim::task::{Phase, SimTask, TaskState};
use crate::sim::trace::{Trace, TraceKind};
use crate::types::{CpuId, Pid, TimeNs};

/// A simulation event, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Event {
    time_ns: TimeNs,
    /// Tiebreaker for events at the same time (lower = higher priority).
    seq: u64,
    kind: EventKind,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time_ns
            .cmp(&other.time_ns)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EventKind {
    /// A task becomes runnable (wakes up).
    TaskWake { pid: Pid },
    /// A task's time slice expires on the given CPU.
    SliceExpired { cpu: CpuId },
    /// A task finishes its current Run phase on the given CPU.
    TaskPhaseComplete { cpu: CpuId },
}

/// Per-CPU host state.
#[derive(Debug, Default)]
struct HostCpu {
    current: Option<Pid>,
    /// Slice granted to the current task at dispatch.
    slice_ns: TimeNs,
}

/// Mutable host state threaded through the event handlers.
struct SimState {
    cpus: Vec<HostCpu>,
    tasks: HashMap<Pid, SimTask>,
    events: BinaryHeap<Reverse<Event>>,
    seq: u64,
    /// Simulated time of the event being processed.
    clock: TimeNs,
    duration_ns: TimeNs,
    trace: Trace,
}

impl SimState {
    fn push_event(&mut self, time_ns: TimeNs, kind: EventKind) {
        self.events.push(Reverse(Event {
            time_ns,
            seq: self.seq,
            kind,
        }));
        self.seq += 1;
    }

    fn record(&mut self, cpu: CpuId, kind: TraceKind) {
        self.trace.record(self.clock, cpu, kind);
    }
}

/// The simulated host.
pub struct Simulator {
    sched: Scheduler,
}

impl Simulator {
    pub fn new(sched: Scheduler) -> Self {
        Simulator { sched }
    }

    /// Run a scenario to completion and return the trace.
    pub fn run(self, scenario: Scenario) -> Trace {
        self.run_with_shutdown(scenario, Arc::new(AtomicBool::new(false)))
    }

    /// Run a scenario, stopping early when `shutdown` is set. An early stop
    /// unregisters the engine instead of completing the workload.
    pub fn run_with_shutdown(self, scenario: Scenario, shutdown: Arc<AtomicBool>) -> Trace {
        let registry = self.sched.registry();
        for &cgid in &scenario.boosted_cgroups {
            if let Err(err) = registry.insert(cgid) {
                warn!("cannot boost cgroup {}: {}", cgid.0, err);
            }
        }

        let mut st = SimState {
            cpus: (0..scenario.nr_cpus)
                .map(|_| HostCpu::default())
                .collect(),
            tasks: scenario
                .tasks
                .iter()
                .map(|def| (def.pid, SimTask::new(def)))
                .collect(),
            events: BinaryHeap::new(),
            seq: 0,
            clock: 0,
            duration_ns: scenario.duration_ns,
            trace: Trace::new(scenario.nr_cpus, &scenario.tasks),
        };

        for def in &scenario.tasks {
            st.push_event(def.start_time_ns, EventKind::TaskWake { pid: def.pid });
        }

        while let Some(Reverse(event)) = st.events.pop() {
            if shutdown.load(Ordering::Relaxed) {
                self.sched.exit(ExitKind::Unreg, "shutdown requested");
                break;
            }
            if event.time_ns > scenario.duration_ns {
                break;
            }
            st.clock = event.time_ns;

            match event.kind {
                EventKind::TaskWake { pid } => self.handle_task_wake(&mut st, pid),
                EventKind::SliceExpired { cpu } => self.handle_slice_expired(&mut st, cpu),
                EventKind::TaskPhaseComplete { cpu } => self.handle_phase_complete(&mut st, cpu),
            }
        }

        // No effect if an exit was already recorded (e.g. shutdown above).
        self.sched.exit(ExitKind::Done, "scenario complete");

        let metrics = self.sched.metrics();
        let exit = self.sched.shutdown();

        let mut trace = st.trace;
        trace.set_metrics(metrics);
        trace.set_exit(exit);
        trace
    }

    fn handle_task_wake(&self, st: &mut SimState, pid: Pid) {
        let Some(sim) = st.tasks.get_mut(&pid) else {
            return;
        };
        if !matches!(sim.state, TaskState::Sleeping) {
            return;
        }

        // Waking ends the Sleep phase the task was parked on.
        if matches!(sim.current_phase(), Some(Phase::Sleep(_))) && !sim.advance_phase() {
            sim.state = TaskState::Exited;
            return;
        }

        match sim.current_phase().cloned() {
            Some(Phase::Run(_)) => {}
            Some(Phase::Sleep(ns)) => {
                // Back-to-back sleeps: stay parked until the next wake.
                let wake_at = st.clock.saturating_add(ns);
                if wake_at <= st.duration_ns {
                    st.push_event(wake_at, EventKind::TaskWake { pid });
                }
                return;
            }
            None => {
                sim.state = TaskState::Exited;
                return;
            }
        }

        sim.state = TaskState::Runnable;

        // enable fires once, when the task first joins the policy. It must
        // precede the first enqueue so a stale vtime is clamped before it
        // can win the queue.
        if !sim.enabled {
            sim.enabled = true;
            self.sched.enable(&mut sim.task);
        }

        let prev_cpu = sim.task.cpu;
        let unit = self.sched.select_unit(&sim.task, prev_cpu);
        sim.task.cpu = unit;
        self.sched.enqueue(&sim.task);
        let vtime = sim.task.vtime;
        debug!("cpu{} wake pid={} vtime={}", unit.0, pid.0, vtime.0);

        st.record(unit, TraceKind::TaskWoke { pid });
        st.record(unit, TraceKind::TaskEnqueued { pid, vtime });

        self.try_dispatch(st, unit);
    }

    fn handle_slice_expired(&self, st: &mut SimState, cpu: CpuId) {
        let Some(pid) = st.cpus[cpu.0 as usize].current else {
            return;
        };
        let slice = st.cpus[cpu.0 as usize].slice_ns;
        let Some(sim) = st.tasks.get_mut(&pid) else {
            return;
        };

        // The entire slice was consumed.
        sim.run_remaining_ns = sim.run_remaining_ns.saturating_sub(slice);
        sim.state = TaskState::Runnable;

        self.sched.stopping(&mut sim.task, st.clock, true);
        self.sched.enqueue(&sim.task);
        let vtime = sim.task.vtime;
        info!(
            "cpu{} PREEMPTED {} pid={} ran={}ns",
            cpu.0, sim.name, pid.0, slice
        );

        st.cpus[cpu.0 as usize].current = None;
        st.record(cpu, TraceKind::TaskPreempted { pid });
        st.record(cpu, TraceKind::TaskEnqueued { pid, vtime });

        self.try_dispatch(st, cpu);
    }

    fn handle_phase_complete(&self, st: &mut SimState, cpu: CpuId) {
        let Some(pid) = st.cpus[cpu.0 as usize].current else {
            return;
        };
        let Some(sim) = st.tasks.get_mut(&pid) else {
            return;
        };

        sim.run_remaining_ns = 0;
        let has_next = sim.advance_phase();
        let next_phase = sim.current_phase().cloned();
        let still_runnable = has_next && matches!(next_phase, Some(Phase::Run(_)));

        self.sched.stopping(&mut sim.task, st.clock, still_runnable);

        if !has_next {
            sim.state = TaskState::Exited;
            self.sched.exit_task(&sim.task);
            info!("cpu{} COMPLETED {} pid={}", cpu.0, sim.name, pid.0);
            st.cpus[cpu.0 as usize].current = None;
            st.record(cpu, TraceKind::TaskCompleted { pid });
        } else {
            match next_phase {
                Some(Phase::Sleep(ns)) => {
                    sim.state = TaskState::Sleeping;
                    info!("cpu{} SLEEPING {} pid={}", cpu.0, sim.name, pid.0);
                    st.cpus[cpu.0 as usize].current = None;
                    st.record(cpu, TraceKind::TaskSlept { pid });

                    let wake_at = st.clock.saturating_add(ns);
                    if wake_at <= st.duration_ns {
                        st.push_event(wake_at, EventKind::TaskWake { pid });
                    }
                }
                Some(Phase::Run(_)) => {
                    // Straight into the next Run phase: still runnable.
                    sim.state = TaskState::Runnable;
                    self.sched.enqueue(&sim.task);
                    let vtime = sim.task.vtime;
                    info!("cpu{} YIELDED {} pid={}", cpu.0, sim.name, pid.0);
                    st.cpus[cpu.0 as usize].current = None;
                    st.record(cpu, TraceKind::TaskYielded { pid });
                    st.record(cpu, TraceKind::TaskEnqueued { pid, vtime });
                }
                None => {
                    sim.state = TaskState::Exited;
                    self.sched.exit_task(&sim.task);
                    st.cpus[cpu.0 as usize].current = None;
                    st.record(cpu, TraceKind::TaskCompleted { pid });
                }
            }
        }

        self.try_dispatch(st, cpu);
    }

    fn try_dispatch(&self, st: &mut SimState, cpu: CpuId) {
        if st.cpus[cpu.0 as usize].current.is_some() {
            return;
        }
        loop {
            let Some(next) = self.sched.dispatch(cpu) else {
                st.record(cpu, TraceKind::CpuIdle);
                info!("cpu{} IDLE", cpu.0);
                return;
            };
            // Queue entries for tasks that exited before being picked
            // are dropped.
            let stale = st
                .tasks
                .get(&next.pid)
                .map_or(true, |sim| matches!(sim.state, TaskState::Exited));
            if !stale {
                self.start_running(st, cpu, next);
                return;
            }
        }
    }

    fn start_running(&self, st: &mut SimState, cpu: CpuId, queued: QueuedTask) {
        let pid = queued.pid;
        let Some(sim) = st.tasks.get_mut(&pid) else {
            return;
        };

        sim.state = TaskState::Running { cpu };
        sim.task.cpu = cpu;
        self.sched.running(&sim.task, st.clock);

        let remaining = sim.run_remaining_ns;
        info!(
            "cpu{} STARTED {} pid={} slice={}ns",
            cpu.0, sim.name, pid.0, queued.slice_ns
        );

        st.cpus[cpu.0 as usize].current = Some(pid);
        st.cpus[cpu.0 as usize].slice_ns = queued.slice_ns;
        st.record(cpu, TraceKind::TaskScheduled { pid });

        if remaining == 0 {
            // No work left in this phase; complete immediately.
            st.push_event(st.clock, EventKind::TaskPhaseComplete { cpu });
        } else if queued.slice_ns > 0 && queued.slice_ns <= remaining {
            // Slice expires before the phase completes.
            st.push_event(st.clock + queued.slice_ns, EventKind::SliceExpired { cpu });
        } else {
            // Phase completes before the slice.
            st.push_event(st.clock + remaining, EventKind::TaskPhaseComplete { cpu });
        }
    }
}
