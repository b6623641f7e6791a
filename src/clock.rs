//! Global virtual-time watermark.
//!
//! `vtime_now` tracks the frontier of virtual time actually being consumed:
//! whenever a task starts executing with a virtual runtime above the
//! watermark, the watermark is advanced to it. It never moves backwards.
//! The watermark is what `enable` clamps late-arriving tasks against, so a
//! task that slept for a long time cannot redeem more than one slice of
//! banked credit.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Vtime;

/// Monotonic watermark of virtual time, shared by all CPUs.
///
/// Advancement is optimistic (read, compare, conditionally write). Losing a
/// race leaves a slightly stale watermark, which is acceptable: the clamp it
/// feeds is itself an approximation.
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: AtomicU64,
}

impl VirtualClock {
    pub fn new() -> Self {
        VirtualClock {
            now: AtomicU64::new(0),
        }
    }

    /// Current watermark value.
    pub fn now(&self) -> Vtime {
        Vtime(self.now.load(Ordering::Relaxed))
    }

    /// Advance the watermark to `candidate` if it is ahead of the current
    /// value (wrapping comparison). Lower or equal candidates are ignored.
    pub fn advance_to(&self, candidate: Vtime) {
        let mut cur = self.now.load(Ordering::Relaxed);
        while Vtime(cur) < candidate {
            match self.now.compare_exchange_weak(
                cur,
                candidate.0,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), Vtime(0));
    }

    #[test]
    fn test_advance_is_monotonic() {
        let clock = VirtualClock::new();
        clock.advance_to(Vtime(1_000));
        assert_eq!(clock.now(), Vtime(1_000));
        clock.advance_to(Vtime(5_000));
        assert_eq!(clock.now(), Vtime(5_000));
    }

    #[test]
    fn test_advance_ignores_lower() {
        let clock = VirtualClock::new();
        clock.advance_to(Vtime(5_000));
        clock.advance_to(Vtime(100));
        assert_eq!(clock.now(), Vtime(5_000));
    }

    #[test]
    fn test_advance_across_wrap() {
        let clock = VirtualClock::new();
        clock.advance_to(Vtime(u64::MAX - 5));
        // A small post-wrap vtime is "after" the pre-wrap watermark.
        clock.advance_to(Vtime(3));
        assert_eq!(clock.now(), Vtime(3));
    }

    #[test]
    fn test_concurrent_advance_keeps_max() {
        use std::sync::Arc;
        use std::thread;

        let clock = Arc::new(VirtualClock::new());
        let mut handles = Vec::new();
        for i in 1..=8u64 {
            let clock = clock.clone();
            handles.push(thread::spawn(move || {
                for v in 0..1_000u64 {
                    clock.advance_to(Vtime(i * 1_000 + v));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(clock.now(), Vtime(8_999));
    }
}
