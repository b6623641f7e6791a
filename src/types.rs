//! Newtype wrappers and type aliases for domain concepts.
//!
//! Newtypes for identifiers (PIDs, CPU IDs, cgroup IDs) and virtual time
//! prevent silent type confusion. Type aliases for plain quantities
//! (timestamps) provide self-documenting code without the boilerplate
//! of implementing arithmetic traits.

/// Process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub i32);

/// CPU identifier. Each CPU owns one dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub u32);

/// Unique cgroup identifier (the kernel's cgroup->kn->id).
///
/// Tasks are weighted by whether their cgroup is present in the priority
/// registry at the moment accounting is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CgroupId(pub u64);

impl CgroupId {
    /// The root cgroup's ID (always 1).
    pub const ROOT: CgroupId = CgroupId(1);
}

/// Time in nanoseconds.
pub type TimeNs = u64;

/// Virtual time for fair scheduling (opaque u64, not nanoseconds).
///
/// Ordering uses wrapping comparison (like the kernel's `time_before64`),
/// so `Vtime(u64::MAX)` compares as less than `Vtime(0)` when they are
/// within half the u64 range of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Vtime(pub u64);

impl Vtime {
    /// Advance by a virtual-runtime delta, wrapping on overflow.
    pub fn advance(self, delta: u64) -> Vtime {
        Vtime(self.0.wrapping_add(delta))
    }
}

impl PartialOrd for Vtime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Vtime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Matches kernel time_before64: (s64)(a - b) < 0 means a < b.
        // Wrapping subtraction cast to i64 handles overflow correctly.
        (self.0.wrapping_sub(other.0) as i64).cmp(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vtime_ordering() {
        assert!(Vtime(0) < Vtime(1));
        assert!(Vtime(100) > Vtime(99));
        assert_eq!(Vtime(42), Vtime(42));
    }

    #[test]
    fn test_vtime_ordering_wraps() {
        // Near the wrap point, a small post-wrap value is "after" a large
        // pre-wrap value.
        assert!(Vtime(u64::MAX) < Vtime(0));
        assert!(Vtime(u64::MAX - 10) < Vtime(5));
    }

    #[test]
    fn test_vtime_advance_wraps() {
        assert_eq!(Vtime(u64::MAX).advance(1), Vtime(0));
        let v = Vtime(u64::MAX - 1).advance(4);
        assert!(Vtime(u64::MAX - 1) < v);
    }
}
