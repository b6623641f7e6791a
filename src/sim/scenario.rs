//! Scenario definition and builder API.

use anyhow::{bail, Result};

use crate::sim::task::{TaskBehavior, TaskDef};
use crate::types::{CgroupId, CpuId, Pid, TimeNs};

/// A complete simulation scenario: CPUs, tasks, boosted cgroups, duration.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub nr_cpus: u32,
    pub tasks: Vec<TaskDef>,
    /// Cgroups to mark in the priority registry before the first event.
    pub boosted_cgroups: Vec<CgroupId>,
    pub duration_ns: TimeNs,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder {
            nr_cpus: 1,
            tasks: Vec::new(),
            boosted_cgroups: Vec::new(),
            duration_ns: 100_000_000, // 100ms default
            next_pid: Pid(1),
        }
    }
}

/// Builder for constructing scenarios.
pub struct ScenarioBuilder {
    nr_cpus: u32,
    tasks: Vec<TaskDef>,
    boosted_cgroups: Vec<CgroupId>,
    duration_ns: TimeNs,
    next_pid: Pid,
}

impl ScenarioBuilder {
    /// Set the number of simulated CPUs.
    pub fn cpus(mut self, n: u32) -> Self {
        self.nr_cpus = n;
        self
    }

    /// Add a task with a full TaskDef.
    pub fn task(mut self, def: TaskDef) -> Self {
        // Advance next_pid past this task's PID to avoid collisions
        // with subsequent add_task() calls.
        if def.pid.0 >= self.next_pid.0 {
            self.next_pid = Pid(def.pid.0 + 1);
        }
        self.tasks.push(def);
        self
    }

    /// Convenience: add a task with an auto-assigned PID, placed on CPU 0
    /// and runnable from time zero.
    pub fn add_task(mut self, name: &str, cgroup_id: CgroupId, behavior: TaskBehavior) -> Self {
        let pid = self.next_pid;
        self.next_pid = Pid(pid.0 + 1);
        self.tasks.push(TaskDef {
            name: name.to_string(),
            pid,
            cgroup_id,
            cpu: CpuId(0),
            behavior,
            start_time_ns: 0,
        });
        self
    }

    /// Mark a cgroup as boosted for the whole scenario.
    pub fn boost_cgroup(mut self, cgid: CgroupId) -> Self {
        self.boosted_cgroups.push(cgid);
        self
    }

    /// Set the simulation duration in nanoseconds.
    pub fn duration_ns(mut self, ns: TimeNs) -> Self {
        self.duration_ns = ns;
        self
    }

    /// Set the simulation duration in milliseconds.
    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ns = ms * 1_000_000;
        self
    }

    /// Build the scenario.
    pub fn build(self) -> Scenario {
        assert!(
            !self.tasks.is_empty(),
            "scenario must have at least one task"
        );
        assert!(self.nr_cpus > 0, "scenario must have at least one CPU");
        Scenario {
            nr_cpus: self.nr_cpus,
            tasks: self.tasks,
            boosted_cgroups: self.boosted_cgroups,
            duration_ns: self.duration_ns,
        }
    }
}

/// Parse a duration string with an optional unit suffix into nanoseconds.
///
/// Supported: `"1s"`, `"500ms"`, `"100us"`, `"1000ns"` and bare numbers
/// (interpreted as nanoseconds).
pub fn parse_duration_ns(s: &str) -> Result<TimeNs> {
    let s = s.trim();
    if s.is_empty() {
        bail!("empty duration string");
    }

    // Try suffixes longest-first to avoid ambiguity (e.g. "ms" before "s").
    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1_000_000.0)
    } else if let Some(n) = s.strip_suffix("us") {
        (n, 1_000.0)
    } else if let Some(n) = s.strip_suffix("ns") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000_000_000.0)
    } else {
        (s, 1.0)
    };

    let num: f64 = match num_str.trim().parse() {
        Ok(n) => n,
        Err(_) => bail!("invalid duration number: {:?}", num_str),
    };
    if num < 0.0 {
        bail!("duration must be non-negative: {:?}", s);
    }

    let ns = num * multiplier;
    if ns > u64::MAX as f64 {
        bail!("duration overflow: {:?}", s);
    }

    Ok(ns as TimeNs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::task::Phase;

    #[test]
    fn test_builder_assigns_sequential_pids() {
        let scenario = Scenario::builder()
            .add_task("a", CgroupId(10), TaskBehavior::forever(vec![Phase::Run(1_000)]))
            .add_task("b", CgroupId(10), TaskBehavior::forever(vec![Phase::Run(1_000)]))
            .build();

        assert_eq!(scenario.tasks[0].pid, Pid(1));
        assert_eq!(scenario.tasks[1].pid, Pid(2));
    }

    #[test]
    fn test_builder_skips_explicit_pids() {
        let scenario = Scenario::builder()
            .task(TaskDef {
                name: "a".into(),
                pid: Pid(7),
                cgroup_id: CgroupId(10),
                cpu: CpuId(0),
                behavior: TaskBehavior::forever(vec![Phase::Run(1_000)]),
                start_time_ns: 0,
            })
            .add_task("b", CgroupId(10), TaskBehavior::forever(vec![Phase::Run(1_000)]))
            .build();

        assert_eq!(scenario.tasks[1].pid, Pid(8));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration_ns("1s").unwrap(), 1_000_000_000);
        assert_eq!(parse_duration_ns("500ms").unwrap(), 500_000_000);
        assert_eq!(parse_duration_ns("100us").unwrap(), 100_000);
        assert_eq!(parse_duration_ns("1000ns").unwrap(), 1_000);
        assert_eq!(parse_duration_ns("250000").unwrap(), 250_000);
        assert_eq!(parse_duration_ns(" 0.5s ").unwrap(), 500_000_000);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration_ns("").is_err());
        assert!(parse_duration_ns("abc").is_err());
        assert!(parse_duration_ns("-1s").is_err());
    }
}
