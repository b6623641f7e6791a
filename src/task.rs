//! Task entity and per-task accounting storage.
//!
//! The host environment owns each `Task`; the engine attaches a `TaskCtx`
//! to it on demand, keyed by pid, and drops it when the host reports the
//! task destroyed. Context allocation can soft-fail when the store is
//! full: the affected accounting step is skipped, the task is still
//! scheduled.

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;

use crate::types::{CgroupId, CpuId, Pid, TimeNs, Vtime};

/// Default maximum number of live task contexts.
pub const DEFAULT_MAX_TASK_CTXS: usize = 10_000;

/// One schedulable unit of execution, owned by the host.
///
/// The engine reads the cgroup membership on every accounting step (it is
/// never cached beyond one step) and updates `vtime` from its callbacks.
#[derive(Debug, Clone)]
pub struct Task {
    /// Stable identifier for the task's lifetime.
    pub pid: Pid,
    /// The priority domain the task currently belongs to.
    pub cgroup_id: CgroupId,
    /// The CPU the task last ran on (target of soft affinity).
    pub cpu: CpuId,
    /// Accumulated weighted execution time, the fairness currency.
    /// Lower values are dispatched sooner.
    pub vtime: Vtime,
}

impl Task {
    pub fn new(pid: Pid, cgroup_id: CgroupId) -> Self {
        Task {
            pid,
            cgroup_id,
            cpu: CpuId(0),
            vtime: Vtime(0),
        }
    }
}

/// Engine-owned accounting state, one per live task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCtx {
    /// Timestamp of the most recent start-of-execution event.
    ///
    /// `Some` only between a `running` event and the matching `stopping`
    /// event; `stopping` takes it, so a stop without a recorded start
    /// skips accounting.
    pub last_run_at: Option<TimeNs>,
}

/// Concurrent map from pid to task context with a fixed capacity.
#[derive(Debug)]
pub struct TaskStore {
    ctxs: DashMap<Pid, TaskCtx>,
    max_ctxs: usize,
}

impl TaskStore {
    /// Create an empty store holding at most `max_ctxs` contexts.
    pub fn new(max_ctxs: usize) -> Self {
        TaskStore {
            ctxs: DashMap::new(),
            max_ctxs,
        }
    }

    /// Look up the context for `pid`, creating it if absent.
    ///
    /// Returns `None` when a new context is needed but the store is full;
    /// the caller must skip accounting for that invocation. The capacity
    /// check is best-effort: concurrent first observations may briefly
    /// overshoot the limit by a few entries.
    pub fn lookup_or_create(&self, pid: Pid) -> Option<RefMut<'_, Pid, TaskCtx>> {
        if let Some(ctx) = self.ctxs.get_mut(&pid) {
            return Some(ctx);
        }
        if self.ctxs.len() >= self.max_ctxs {
            return None;
        }
        Some(self.ctxs.entry(pid).or_default())
    }

    /// Drop the context for a task destroyed by the host.
    pub fn remove(&self, pid: Pid) {
        self.ctxs.remove(&pid);
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.ctxs.len()
    }

    /// Whether the store holds no contexts.
    pub fn is_empty(&self) -> bool {
        self.ctxs.is_empty()
    }

    /// The capacity limit.
    pub fn max_ctxs(&self) -> usize {
        self.max_ctxs
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TASK_CTXS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_creates_once() {
        let store = TaskStore::new(10);
        {
            let mut ctx = store.lookup_or_create(Pid(1)).unwrap();
            ctx.last_run_at = Some(42);
        }
        assert_eq!(store.len(), 1);

        let ctx = store.lookup_or_create(Pid(1)).unwrap();
        assert_eq!(ctx.last_run_at, Some(42));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_allocation_soft_fails_at_capacity() {
        let store = TaskStore::new(2);
        assert!(store.lookup_or_create(Pid(1)).is_some());
        assert!(store.lookup_or_create(Pid(2)).is_some());

        // A third task gets no context, but existing ones stay reachable.
        assert!(store.lookup_or_create(Pid(3)).is_none());
        assert!(store.lookup_or_create(Pid(1)).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_frees_capacity() {
        let store = TaskStore::new(1);
        assert!(store.lookup_or_create(Pid(1)).is_some());
        assert!(store.lookup_or_create(Pid(2)).is_none());

        store.remove(Pid(1));
        assert!(store.is_empty());
        assert!(store.lookup_or_create(Pid(2)).is_some());
    }
}
