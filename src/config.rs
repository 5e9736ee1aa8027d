// SPDX-License-Identifier: Apache-2.0

//! Configuration for the path tree, priority buffer and drive loop.
//!
//! Everything is an explicit struct threaded through constructors; there is
//! no global options state.

use std::time::Duration;

use regex::Regex;

use crate::classifier::MIN_TRAINING_SAMPLES;
use crate::path::{BranchId, EntryPointId};

/// Branch-id filter for the coverage-based indices. `BranchFilter::any()`
/// matches every branch.
#[derive(Debug, Clone, Default)]
pub struct BranchFilter {
    pattern: Option<Regex>,
}

impl BranchFilter {
    pub fn any() -> Self {
        BranchFilter { pattern: None }
    }

    pub fn matching(pattern: Regex) -> Self {
        BranchFilter {
            pattern: Some(pattern),
        }
    }

    pub fn matches(&self, branch: &BranchId) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(branch.as_str()),
            None => true,
        }
    }
}

/// Settings for the infeasibility index.
///
/// Feasibility training is keyed by entry point rather than branch, so its
/// filter pattern is matched against the entry-point id: solve outcomes for
/// non-matching entry points do not feed the classifier.
#[derive(Debug, Clone)]
pub struct InfeasibilityConfig {
    pub entry_filter: Option<Regex>,
    /// Training-set size required before an infeasibility reclassification
    /// pass is attempted.
    pub min_training_set: usize,
}

impl Default for InfeasibilityConfig {
    fn default() -> Self {
        InfeasibilityConfig {
            entry_filter: None,
            min_training_set: MIN_TRAINING_SAMPLES,
        }
    }
}

impl InfeasibilityConfig {
    pub fn admits(&self, entry: &EntryPointId) -> bool {
        match &self.entry_filter {
            Some(re) => re.is_match(entry.as_str()),
            None => true,
        }
    }
}

/// Scheduler configuration shared by the path tree and the priority buffer.
///
/// Each of the three heuristic indices is independently togglable: `None`
/// disables the index entirely, and the queue layout of the buffer follows
/// from which indices are active.
#[derive(Debug, Clone)]
pub struct SchedConfig {
    pub improvability: Option<BranchFilter>,
    pub novelty: Option<BranchFilter>,
    pub infeasibility: Option<InfeasibilityConfig>,
    /// Seed for the buffer's weighted-random dequeue draws.
    pub seed: u64,
    /// Upper bound on how long an empty `poll` sleeps before reporting "no
    /// item".
    pub poll_sleep: Duration,
}

impl Default for SchedConfig {
    fn default() -> Self {
        SchedConfig {
            improvability: Some(BranchFilter::any()),
            novelty: Some(BranchFilter::any()),
            infeasibility: Some(InfeasibilityConfig::default()),
            seed: 0,
            poll_sleep: Duration::from_millis(50),
        }
    }
}

impl SchedConfig {
    /// A configuration with every index disabled: one FIFO queue.
    pub fn fifo() -> Self {
        SchedConfig {
            improvability: None,
            novelty: None,
            infeasibility: None,
            ..SchedConfig::default()
        }
    }

    pub fn active_index_count(&self) -> usize {
        usize::from(self.improvability.is_some())
            + usize::from(self.novelty.is_some())
            + usize::from(self.infeasibility.is_some())
    }
}

/// Configuration for the drive loop that alternates the two collaborators.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads consuming work items.
    pub workers: usize,
    /// Exploration depth requested from the symbolic-execution collaborator.
    pub exploration_depth: usize,
    /// Per-poll timeout; workers observe the stop flag between polls.
    pub poll_timeout: Duration,
    /// Items processed per worker between improvability/novelty
    /// reclassification passes.
    pub reclassify_every: usize,
    /// Consecutive empty polls after which a worker concludes the run is
    /// drained and exits.
    pub max_idle_polls: usize,
    /// Optional global cap on processed items.
    pub max_items: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: 2,
            exploration_depth: 1,
            poll_timeout: Duration::from_millis(100),
            reclassify_every: 8,
            max_idle_polls: 4,
            max_items: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_filter_any_matches_everything() {
        let f = BranchFilter::any();
        assert!(f.matches(&BranchId::from("anything:at:all")));
    }

    #[test]
    fn branch_filter_pattern() {
        let f = BranchFilter::matching(Regex::new(r"^com\.example\.").unwrap());
        assert!(f.matches(&BranchId::from("com.example.Foo:17")));
        assert!(!f.matches(&BranchId::from("org.other.Bar:2")));
    }

    #[test]
    fn active_index_count() {
        assert_eq!(SchedConfig::default().active_index_count(), 3);
        assert_eq!(SchedConfig::fifo().active_index_count(), 0);
        let two = SchedConfig {
            infeasibility: None,
            ..SchedConfig::default()
        };
        assert_eq!(two.active_index_count(), 2);
    }

    #[test]
    fn infeasibility_entry_filter() {
        let cfg = InfeasibilityConfig {
            entry_filter: Some(Regex::new(r"Target\.").unwrap()),
            ..InfeasibilityConfig::default()
        };
        assert!(cfg.admits(&EntryPointId::from("Target.frob(I)V")));
        assert!(!cfg.admits(&EntryPointId::from("Helper.aux()V")));
    }
}
