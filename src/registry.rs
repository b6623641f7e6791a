//! Priority registry: the set of cgroups currently marked boosted.
//!
//! The registry is populated by an external administrative agent and read
//! by the engine on every accounting step. Reads never block behind a
//! global lock and tolerate eventual consistency: a task may be accounted
//! at the old weight for at most one accounting cycle after an update.
//!
//! Like the BPF hash map it models, the registry has a fixed capacity;
//! insertion into a full registry is refused rather than silently dropped.

use dashmap::DashSet;

use crate::types::CgroupId;

/// Default maximum number of boosted cgroups.
pub const DEFAULT_MAX_BOOSTED: usize = 100;

/// Concurrent set of boosted cgroup IDs with a fixed capacity.
#[derive(Debug)]
pub struct PriorityRegistry {
    boosted: DashSet<CgroupId>,
    max_entries: usize,
}

impl PriorityRegistry {
    /// Create an empty registry holding at most `max_entries` cgroups.
    pub fn new(max_entries: usize) -> Self {
        PriorityRegistry {
            boosted: DashSet::new(),
            max_entries,
        }
    }

    /// Mark a cgroup as boosted.
    ///
    /// Returns `Ok(())` if the cgroup is now in the set (including when it
    /// already was), `Err(-12)` (ENOMEM) if the registry is full.
    pub fn insert(&self, cgid: CgroupId) -> Result<(), i32> {
        if self.boosted.contains(&cgid) {
            return Ok(());
        }
        if self.boosted.len() >= self.max_entries {
            return Err(-12); // ENOMEM
        }
        self.boosted.insert(cgid);
        Ok(())
    }

    /// Remove a cgroup from the boosted set. Returns true if it was present.
    pub fn remove(&self, cgid: CgroupId) -> bool {
        self.boosted.remove(&cgid).is_some()
    }

    /// Whether a cgroup is currently boosted.
    ///
    /// Absence means normal weight; this is never an error.
    pub fn is_boosted(&self, cgid: CgroupId) -> bool {
        self.boosted.contains(&cgid)
    }

    /// Number of boosted cgroups.
    pub fn len(&self) -> usize {
        self.boosted.len()
    }

    /// Whether no cgroup is boosted.
    pub fn is_empty(&self) -> bool {
        self.boosted.is_empty()
    }

    /// The capacity limit.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl Default for PriorityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BOOSTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let registry = PriorityRegistry::new(DEFAULT_MAX_BOOSTED);
        assert!(!registry.is_boosted(CgroupId(7)));

        registry.insert(CgroupId(7)).unwrap();
        assert!(registry.is_boosted(CgroupId(7)));
        assert!(!registry.is_boosted(CgroupId(8)));
    }

    #[test]
    fn test_insert_refused_at_capacity() {
        let registry = PriorityRegistry::new(2);
        assert!(registry.insert(CgroupId(1)).is_ok());
        assert!(registry.insert(CgroupId(2)).is_ok());
        assert_eq!(registry.insert(CgroupId(3)), Err(-12));
        assert_eq!(registry.len(), 2);

        // Re-inserting a member is not an allocation and still succeeds.
        assert!(registry.insert(CgroupId(1)).is_ok());
    }

    #[test]
    fn test_remove_frees_capacity() {
        let registry = PriorityRegistry::new(1);
        registry.insert(CgroupId(1)).unwrap();
        assert_eq!(registry.insert(CgroupId(2)), Err(-12));

        assert!(registry.remove(CgroupId(1)));
        assert!(!registry.remove(CgroupId(1)));
        assert!(registry.insert(CgroupId(2)).is_ok());
        assert!(registry.is_boosted(CgroupId(2)));
    }
}
