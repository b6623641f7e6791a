//! Scheduler statistics.
//!
//! The engine updates a set of relaxed atomic counters from the hot
//! callbacks and exposes point-in-time [`Metrics`] snapshots for
//! reporting. Snapshots are plain serde values so they can be printed as
//! JSON or formatted for humans.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Event counters updated from the scheduling callbacks.
#[derive(Debug, Default)]
pub struct Counters {
    /// Tasks inserted into a dispatch queue.
    pub nr_enqueues: AtomicU64,
    /// Dispatch requests that produced a task.
    pub nr_dispatches: AtomicU64,
    /// Dispatch requests that found the queue empty.
    pub nr_idle_dispatches: AtomicU64,
    /// Accounting skipped because the context store was full.
    pub nr_ctx_alloc_fails: AtomicU64,
    /// Activations that had their virtual runtime raised to the floor.
    pub nr_clamped_enables: AtomicU64,
    /// Stop events whose measured runtime was clamped to zero.
    pub nr_zero_deltas: AtomicU64,
}

impl Counters {
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of scheduler state and counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metrics {
    pub nr_enqueues: u64,
    pub nr_dispatches: u64,
    pub nr_idle_dispatches: u64,
    pub nr_ctx_alloc_fails: u64,
    pub nr_clamped_enables: u64,
    pub nr_zero_deltas: u64,
    /// Tasks currently sitting in dispatch queues.
    pub nr_queued: u64,
    /// Task contexts currently allocated.
    pub nr_task_ctxs: u64,
    /// Cgroups currently marked as boosted.
    pub nr_boosted_cgroups: u64,
    /// Current value of the global virtual clock.
    pub vtime_now: u64,
}

impl Metrics {
    pub fn from_counters(counters: &Counters) -> Self {
        Metrics {
            nr_enqueues: counters.nr_enqueues.load(Ordering::Relaxed),
            nr_dispatches: counters.nr_dispatches.load(Ordering::Relaxed),
            nr_idle_dispatches: counters.nr_idle_dispatches.load(Ordering::Relaxed),
            nr_ctx_alloc_fails: counters.nr_ctx_alloc_fails.load(Ordering::Relaxed),
            nr_clamped_enables: counters.nr_clamped_enables.load(Ordering::Relaxed),
            nr_zero_deltas: counters.nr_zero_deltas.load(Ordering::Relaxed),
            ..Default::default()
        }
    }

    pub fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(
            w,
            "[{}] queued: {:>4} ctxs: {:<5} boosted: {:<3} vtime: {:<12} | enq: {:<6} disp: {:<6} idle: {:<6} | ctx_fail: {:<4} clamp: {:<4} zero: {:<4}",
            crate::SCHEDULER_NAME,
            self.nr_queued,
            self.nr_task_ctxs,
            self.nr_boosted_cgroups,
            self.vtime_now,
            self.nr_enqueues,
            self.nr_dispatches,
            self.nr_idle_dispatches,
            self.nr_ctx_alloc_fails,
            self.nr_clamped_enables,
            self.nr_zero_deltas
        )?;
        Ok(())
    }

    /// Counter difference against an earlier snapshot. Gauges keep their
    /// current value.
    pub fn delta(&self, rhs: &Self) -> Self {
        Self {
            nr_enqueues: self.nr_enqueues - rhs.nr_enqueues,
            nr_dispatches: self.nr_dispatches - rhs.nr_dispatches,
            nr_idle_dispatches: self.nr_idle_dispatches - rhs.nr_idle_dispatches,
            nr_ctx_alloc_fails: self.nr_ctx_alloc_fails - rhs.nr_ctx_alloc_fails,
            nr_clamped_enables: self.nr_clamped_enables - rhs.nr_clamped_enables,
            nr_zero_deltas: self.nr_zero_deltas - rhs.nr_zero_deltas,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reads_counters() {
        let counters = Counters::default();
        Counters::inc(&counters.nr_enqueues);
        Counters::inc(&counters.nr_enqueues);
        Counters::inc(&counters.nr_dispatches);

        let m = Metrics::from_counters(&counters);
        assert_eq!(m.nr_enqueues, 2);
        assert_eq!(m.nr_dispatches, 1);
        assert_eq!(m.nr_idle_dispatches, 0);
    }

    #[test]
    fn test_delta_subtracts_counters_keeps_gauges() {
        let prev = Metrics {
            nr_enqueues: 10,
            nr_dispatches: 8,
            nr_queued: 2,
            vtime_now: 1_000,
            ..Default::default()
        };
        let cur = Metrics {
            nr_enqueues: 25,
            nr_dispatches: 20,
            nr_queued: 5,
            vtime_now: 9_000,
            ..Default::default()
        };

        let d = cur.delta(&prev);
        assert_eq!(d.nr_enqueues, 15);
        assert_eq!(d.nr_dispatches, 12);
        assert_eq!(d.nr_queued, 5);
        assert_eq!(d.vtime_now, 9_000);
    }

    #[test]
    fn test_format_mentions_scheduler_name() {
        let mut out = Vec::new();
        Metrics::default().format(&mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert!(line.contains(crate::SCHEDULER_NAME));
    }
}
