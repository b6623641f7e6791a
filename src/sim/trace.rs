//! Trace event recording for the simulated host.
//!
//! Every scheduling action (task scheduled, preempted, slept, woke, CPU
//! idle) is recorded as a [`TraceEvent`] with a simulated timestamp and CPU
//! ID. The final [`Trace`] also carries the engine's exit reason and a
//! metrics snapshot taken right before teardown.

use crate::exit::ExitInfo;
use crate::sim::task::TaskDef;
use crate::stats::Metrics;
use crate::types::{CpuId, Pid, TimeNs, Vtime};

/// A single trace event produced by the simulated host.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    /// Simulated time in nanoseconds when this event occurred.
    pub time_ns: TimeNs,
    /// The CPU on which this event occurred.
    pub cpu: CpuId,
    pub kind: TraceKind,
}

/// The type of scheduling event recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    /// A task was scheduled to run on this CPU.
    TaskScheduled { pid: Pid },
    /// A task was preempted (slice expired) on this CPU.
    TaskPreempted { pid: Pid },
    /// A task yielded (phase complete but still runnable) on this CPU.
    TaskYielded { pid: Pid },
    /// A task voluntarily slept on this CPU.
    TaskSlept { pid: Pid },
    /// A task woke up.
    TaskWoke { pid: Pid },
    /// A task completed all its phases.
    TaskCompleted { pid: Pid },
    /// A task entered a dispatch queue with the given vtime.
    TaskEnqueued { pid: Pid, vtime: Vtime },
    /// The CPU became idle (no tasks to run).
    CpuIdle,
}

/// A complete simulation trace, with all events in chronological order.
#[derive(Debug, Clone)]
pub struct Trace {
    events: Vec<TraceEvent>,
    nr_cpus: u32,
    task_names: Vec<(Pid, String)>,
    exit: ExitInfo,
    metrics: Metrics,
}

impl Trace {
    pub(crate) fn new(nr_cpus: u32, tasks: &[TaskDef]) -> Self {
        let task_names = tasks.iter().map(|t| (t.pid, t.name.clone())).collect();
        Trace {
            events: Vec::new(),
            nr_cpus,
            task_names,
            exit: ExitInfo::default(),
            metrics: Metrics::default(),
        }
    }

    pub(crate) fn record(&mut self, time_ns: TimeNs, cpu: CpuId, kind: TraceKind) {
        self.events.push(TraceEvent { time_ns, cpu, kind });
    }

    pub(crate) fn set_exit(&mut self, exit: ExitInfo) {
        self.exit = exit;
    }

    pub(crate) fn set_metrics(&mut self, metrics: Metrics) {
        self.metrics = metrics;
    }

    /// All events in chronological order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// How the engine exited.
    pub fn exit_info(&self) -> &ExitInfo {
        &self.exit
    }

    /// Engine metrics snapshot taken right before teardown.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// All tasks in the scenario, as (pid, name) pairs.
    pub fn tasks(&self) -> &[(Pid, String)] {
        &self.task_names
    }

    /// Resolve a PID to a task name, or `"???"` if unknown.
    pub fn task_name(&self, pid: Pid) -> &str {
        self.task_names
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, n)| n.as_str())
            .unwrap_or("???")
    }

    /// Total runtime (nanoseconds) for a given task PID.
    ///
    /// Sums the intervals between `TaskScheduled` and the next
    /// `TaskPreempted`/`TaskYielded`/`TaskSlept`/`TaskCompleted` for that
    /// PID. Open intervals (task still running when the scenario ends) are
    /// not counted.
    pub fn total_runtime(&self, pid: Pid) -> TimeNs {
        let mut total: TimeNs = 0;
        let mut running_since: Option<TimeNs> = None;

        for event in &self.events {
            match &event.kind {
                TraceKind::TaskScheduled { pid: p } if *p == pid => {
                    running_since = Some(event.time_ns);
                }
                TraceKind::TaskPreempted { pid: p }
                | TraceKind::TaskYielded { pid: p }
                | TraceKind::TaskSlept { pid: p }
                | TraceKind::TaskCompleted { pid: p }
                    if *p == pid =>
                {
                    if let Some(start) = running_since.take() {
                        total += event.time_ns - start;
                    }
                }
                _ => {}
            }
        }

        total
    }

    /// Number of times a task was scheduled.
    pub fn schedule_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::TaskScheduled { pid: p } if p == pid))
            .count()
    }

    /// Number of times a task was preempted.
    pub fn preempt_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::TaskPreempted { pid: p } if p == pid))
            .count()
    }

    /// Number of times a CPU went idle.
    pub fn idle_count(&self, cpu: CpuId) -> usize {
        self.events
            .iter()
            .filter(|e| e.cpu == cpu && matches!(e.kind, TraceKind::CpuIdle))
            .count()
    }

    /// The vtime a task carried into its most recent enqueue.
    pub fn vtime_at_last_enqueue(&self, pid: Pid) -> Option<Vtime> {
        self.events
            .iter()
            .rev()
            .find_map(|e| match e.kind {
                TraceKind::TaskEnqueued { pid: p, vtime } if p == pid => Some(vtime),
                _ => None,
            })
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::TaskScheduled { pid } => {
                    format!("SCHED    {} pid={}", self.task_name(*pid), pid.0)
                }
                TraceKind::TaskPreempted { pid } => {
                    format!("PREEMPT  {} pid={}", self.task_name(*pid), pid.0)
                }
                TraceKind::TaskYielded { pid } => {
                    format!("YIELD    {} pid={}", self.task_name(*pid), pid.0)
                }
                TraceKind::TaskSlept { pid } => {
                    format!("SLEEP    {} pid={}", self.task_name(*pid), pid.0)
                }
                TraceKind::TaskWoke { pid } => {
                    format!("WAKE     {} pid={}", self.task_name(*pid), pid.0)
                }
                TraceKind::TaskCompleted { pid } => {
                    format!("COMPLETE {} pid={}", self.task_name(*pid), pid.0)
                }
                TraceKind::TaskEnqueued { pid, vtime } => {
                    format!(
                        "ENQUEUE  {} pid={} vtime={}",
                        self.task_name(*pid),
                        pid.0,
                        vtime.0
                    )
                }
                TraceKind::CpuIdle => "IDLE".to_string(),
            };
            eprintln!(
                "[{:>12} ns] cpu={:<3} {}",
                event.time_ns, event.cpu.0, desc
            );
        }
        eprintln!("({} events, {} CPUs)", self.events.len(), self.nr_cpus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trace() -> Trace {
        let mut trace = Trace::new(1, &[]);
        trace.record(0, CpuId(0), TraceKind::TaskScheduled { pid: Pid(1) });
        trace.record(5_000, CpuId(0), TraceKind::TaskPreempted { pid: Pid(1) });
        trace.record(
            5_000,
            CpuId(0),
            TraceKind::TaskEnqueued {
                pid: Pid(1),
                vtime: Vtime(5_000),
            },
        );
        trace.record(5_000, CpuId(0), TraceKind::TaskScheduled { pid: Pid(2) });
        trace.record(8_000, CpuId(0), TraceKind::TaskCompleted { pid: Pid(2) });
        trace.record(8_000, CpuId(0), TraceKind::TaskScheduled { pid: Pid(1) });
        trace.record(9_500, CpuId(0), TraceKind::TaskCompleted { pid: Pid(1) });
        trace.record(9_500, CpuId(0), TraceKind::CpuIdle);
        trace
    }

    #[test]
    fn test_total_runtime_sums_intervals() {
        let trace = sample_trace();
        assert_eq!(trace.total_runtime(Pid(1)), 6_500);
        assert_eq!(trace.total_runtime(Pid(2)), 3_000);
    }

    #[test]
    fn test_schedule_and_idle_counts() {
        let trace = sample_trace();
        assert_eq!(trace.schedule_count(Pid(1)), 2);
        assert_eq!(trace.schedule_count(Pid(2)), 1);
        assert_eq!(trace.preempt_count(Pid(1)), 1);
        assert_eq!(trace.idle_count(CpuId(0)), 1);
    }

    #[test]
    fn test_vtime_at_last_enqueue() {
        let trace = sample_trace();
        assert_eq!(trace.vtime_at_last_enqueue(Pid(1)), Some(Vtime(5_000)));
        assert_eq!(trace.vtime_at_last_enqueue(Pid(2)), None);
    }
}
