//! Dispatch queue (DSQ) management.
//!
//! Each CPU owns one vtime-ordered queue of runnable tasks. Insertion is
//! priority-queue semantics (lowest virtual runtime first), never FIFO;
//! equal vtimes fall back to insertion order. A task sits in at most one
//! queue at a time.
//!
//! Queues are created once at scheduler initialization and never recreated
//! while the scheduler is active. Creation is fallible, modeling the map
//! allocation limits of the environment the policy targets.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::types::{CpuId, Pid, TimeNs, Vtime};

/// Default maximum number of dispatch queues.
pub const DEFAULT_MAX_DSQS: u32 = 1024;

/// A runnable task queued for dispatch, carrying its slice budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedTask {
    pub pid: Pid,
    /// The quantum the task may run before preemption/rotation.
    pub slice_ns: TimeNs,
}

/// A single vtime-ordered dispatch queue.
#[derive(Debug, Default)]
pub struct Dsq {
    /// Entries keyed by (vtime, insertion_order) -> task.
    /// The insertion order provides a tiebreaker for equal vtimes.
    entries: BTreeMap<(Vtime, u64), QueuedTask>,
    /// Monotonic counter for insertion ordering.
    insertion_counter: u64,
}

impl Dsq {
    pub fn new() -> Self {
        Dsq::default()
    }

    /// Insert a task ordered by vtime.
    pub fn insert_vtime(&mut self, task: QueuedTask, vtime: Vtime) {
        let order = self.insertion_counter;
        self.insertion_counter += 1;
        self.entries.insert((vtime, order), task);
    }

    /// Pop the lowest-vtime task.
    pub fn pop(&mut self) -> Option<QueuedTask> {
        let (&key, &task) = self.entries.iter().next()?;
        self.entries.remove(&key);
        Some(task)
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return all PIDs in dispatch order without consuming.
    pub fn ordered_pids(&self) -> Vec<Pid> {
        self.entries.values().map(|t| t.pid).collect()
    }
}

/// The full set of per-CPU dispatch queues.
///
/// Built during `init` with `&mut self`, then shared immutably: concurrent
/// callbacks only ever lock one queue at a time, and each critical section
/// is a single O(log n) insert or pop.
#[derive(Debug)]
pub struct DsqSet {
    dsqs: HashMap<CpuId, Mutex<Dsq>>,
    max_dsqs: u32,
}

impl DsqSet {
    /// Create an empty set allowing at most `max_dsqs` queues.
    pub fn new(max_dsqs: u32) -> Self {
        DsqSet {
            dsqs: HashMap::new(),
            max_dsqs,
        }
    }

    /// Create the dispatch queue for a CPU.
    ///
    /// Returns `Err(-17)` (EEXIST) if the CPU already has a queue and
    /// `Err(-12)` (ENOMEM) if the queue limit has been reached.
    pub fn create(&mut self, cpu: CpuId) -> Result<(), i32> {
        if self.dsqs.contains_key(&cpu) {
            return Err(-17); // EEXIST
        }
        if self.dsqs.len() as u32 >= self.max_dsqs {
            return Err(-12); // ENOMEM
        }
        self.dsqs.insert(cpu, Mutex::new(Dsq::new()));
        Ok(())
    }

    /// Insert a task into a CPU's queue, ordered by vtime.
    /// Returns false if the CPU has no queue.
    pub fn insert_vtime(&self, cpu: CpuId, task: QueuedTask, vtime: Vtime) -> bool {
        match self.dsqs.get(&cpu) {
            Some(dsq) => {
                Self::lock(dsq).insert_vtime(task, vtime);
                true
            }
            None => false,
        }
    }

    /// Pop the lowest-vtime task from a CPU's queue.
    pub fn pop(&self, cpu: CpuId) -> Option<QueuedTask> {
        self.dsqs.get(&cpu).and_then(|dsq| Self::lock(dsq).pop())
    }

    /// Number of tasks queued on a CPU.
    pub fn nr_queued(&self, cpu: CpuId) -> usize {
        self.dsqs.get(&cpu).map_or(0, |dsq| Self::lock(dsq).len())
    }

    /// Total number of tasks queued across all CPUs.
    pub fn nr_queued_total(&self) -> usize {
        self.dsqs.values().map(|dsq| Self::lock(dsq).len()).sum()
    }

    /// PIDs queued on a CPU, in dispatch order, without consuming.
    pub fn ordered_pids(&self, cpu: CpuId) -> Vec<Pid> {
        self.dsqs
            .get(&cpu)
            .map_or_else(Vec::new, |dsq| Self::lock(dsq).ordered_pids())
    }

    /// Number of queues in the set.
    pub fn nr_dsqs(&self) -> usize {
        self.dsqs.len()
    }

    // Queue ops never leave the map torn, so a poisoned lock (panicked
    // holder) is safe to recover.
    fn lock(dsq: &Mutex<Dsq>) -> MutexGuard<'_, Dsq> {
        dsq.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
