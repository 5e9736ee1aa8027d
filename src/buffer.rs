// SPDX-License-Identifier: Apache-2.0

//! The priority buffer: partitioned FIFO queues with weighted-random
//! dequeue.
//!
//! Work items are filed into integer queue classes computed from the active
//! heuristic indices (improvability, novelty, infeasibility); how many
//! queues exist and how a queue number is derived depends on which indices
//! the configuration enables. Dequeue draws a starting rank from a fixed
//! probability table favoring the best queue, then degrades gracefully:
//! first toward worse queues, then back toward better ones, and finally a
//! bounded sleep-and-return-empty so consumers can observe shutdown between
//! polls instead of blocking forever.
//!
//! Reclassification is the mechanism by which a path's priority adapts as
//! *other* paths are explored: observed outcomes are buffered by the
//! `learn_*` calls and applied by the `update_*_and_reclassify` passes,
//! which atomically move still-resident items between queues under the path
//! tree's lock (lock order: tree before buffer).

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::classifier::TrainingSample;
use crate::config::SchedConfig;
use crate::path::{BranchId, EntryPointId, PathCondition, WorkItem};
use crate::path_tree::{PathTree, TreeInner};
use crate::signature;

/// Weight tables, best rank first, each summing to 100.
const WEIGHTS_1: [u32; 1] = [100];
const WEIGHTS_3: [u32; 3] = [60, 30, 10];
const WEIGHTS_4: [u32; 4] = [50, 30, 15, 5];
const WEIGHTS_11: [u32; 11] = [50, 12, 9, 7, 6, 5, 4, 3, 2, 1, 1];

/// Queue numbers in best-to-worst order plus the per-rank draw weights.
#[derive(Debug, Clone)]
struct QueueLayout {
    ranking: Vec<usize>,
    weights: Vec<u32>,
}

impl QueueLayout {
    fn for_config(cfg: &SchedConfig) -> Self {
        let improvability = cfg.improvability.is_some();
        let novelty = cfg.novelty.is_some();
        let infeasibility = cfg.infeasibility.is_some();
        match (improvability, novelty, infeasibility) {
            (false, false, false) => QueueLayout {
                ranking: vec![0],
                weights: WEIGHTS_1.to_vec(),
            },
            // Sole improvability: the raw 0..=10 value is the queue number,
            // higher meaning more uncovered neighbors, i.e. better.
            (true, false, false) => QueueLayout {
                ranking: (0..=10).rev().collect(),
                weights: WEIGHTS_11.to_vec(),
            },
            // Sole novelty: lower hit count is rarer, i.e. better.
            (false, true, false) => QueueLayout {
                ranking: (0..=10).collect(),
                weights: WEIGHTS_11.to_vec(),
            },
            // Sole infeasibility: higher means more confidently feasible.
            (false, false, true) => QueueLayout {
                ranking: vec![3, 2, 1, 0],
                weights: WEIGHTS_4.to_vec(),
            },
            // Two active indices: queue = number of threshold predicates
            // that hold, 0..=2.
            (true, true, false) | (true, false, true) | (false, true, true) => QueueLayout {
                ranking: vec![2, 1, 0],
                weights: WEIGHTS_3.to_vec(),
            },
            // All three: same predicate counting, 0..=3.
            (true, true, true) => QueueLayout {
                ranking: vec![3, 2, 1, 0],
                weights: WEIGHTS_4.to_vec(),
            },
        }
    }

    fn queue_count(&self) -> usize {
        self.ranking.len()
    }
}

/// Filing failed because the path's active indices are not computable yet
/// (the path or its signature is unknown to the tree). The caller defers or
/// drops the item; it must not crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddError {
    NotIndexed,
}

impl fmt::Display for AddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddError::NotIndexed => write!(f, "work item path is not indexed in the path tree"),
        }
    }
}

impl std::error::Error for AddError {}

struct BufferState<P> {
    queues: Vec<VecDeque<WorkItem<P>>>,
    rng: Pcg64Mcg,
    pending_improvability: BTreeSet<BranchId>,
    pending_novelty: BTreeSet<BranchId>,
    pending_infeasibility: Vec<(EntryPointId, PathCondition, bool)>,
}

/// Multi-index priority buffer over a shared [`PathTree`].
pub struct PriorityBuffer<P> {
    tree: Arc<PathTree>,
    cfg: SchedConfig,
    layout: QueueLayout,
    rank_dist: WeightedIndex<u32>,
    state: Mutex<BufferState<P>>,
}

impl<P: Send> PriorityBuffer<P> {
    pub fn new(tree: Arc<PathTree>, cfg: SchedConfig) -> Self {
        let layout = QueueLayout::for_config(&cfg);
        let rank_dist = WeightedIndex::new(layout.weights.iter().copied())
            .expect("weight tables are fixed and non-empty");
        let queues = (0..layout.queue_count()).map(|_| VecDeque::new()).collect();
        PriorityBuffer {
            rank_dist,
            state: Mutex::new(BufferState {
                queues,
                rng: Pcg64Mcg::seed_from_u64(cfg.seed),
                pending_improvability: BTreeSet::new(),
                pending_novelty: BTreeSet::new(),
                pending_infeasibility: Vec::new(),
            }),
            tree,
            cfg,
            layout,
        }
    }

    pub fn tree(&self) -> &Arc<PathTree> {
        &self.tree
    }

    pub fn queue_count(&self) -> usize {
        self.layout.queue_count()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queues.iter().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current queue occupancy, indexed by queue number.
    pub fn queue_sizes(&self) -> Vec<usize> {
        self.state
            .lock()
            .unwrap()
            .queues
            .iter()
            .map(|q| q.len())
            .collect()
    }

    fn queue_number_inner(
        &self,
        tree: &mut TreeInner,
        entry: &EntryPointId,
        path: &PathCondition,
    ) -> Option<usize> {
        let improvability = match &self.cfg.improvability {
            Some(_) => Some(tree.improvability(entry, path)?),
            None => None,
        };
        let novelty = match &self.cfg.novelty {
            Some(_) => Some(tree.novelty(entry, path)?),
            None => None,
        };
        let infeasibility = match &self.cfg.infeasibility {
            Some(_) => Some(tree.infeasibility(entry, path, self.tree.classifier())?),
            None => None,
        };

        let qn = match self.cfg.active_index_count() {
            0 => 0,
            1 => {
                // The sole active raw value is the queue number directly.
                usize::from(
                    improvability
                        .or(novelty)
                        .or(infeasibility)
                        .expect("exactly one index is active"),
                )
            }
            _ => {
                // Count the active threshold predicates that hold.
                usize::from(improvability.is_some_and(|v| v > 0))
                    + usize::from(novelty.is_some_and(|v| v < 2))
                    + usize::from(infeasibility.is_some_and(|v| v > 1))
            }
        };
        debug_assert!(qn < self.layout.queue_count());
        Some(qn)
    }

    /// The queue class `(entry, path)` would currently be filed under, or
    /// `None` while the path's active indices cannot be computed yet.
    pub fn calculate_queue_number(
        &self,
        entry: &EntryPointId,
        path: &PathCondition,
    ) -> Option<usize> {
        let mut tree = self.tree.lock();
        self.queue_number_inner(&mut tree, entry, path)
    }

    /// Scores `item` against the path tree and appends it to its queue
    /// (FIFO within a queue).
    pub fn add(&self, item: WorkItem<P>) -> Result<(), AddError> {
        let mut tree = self.tree.lock();
        let qn = self
            .queue_number_inner(&mut tree, &item.entry_point, &item.path)
            .ok_or(AddError::NotIndexed)?;
        let mut st = self.state.lock().unwrap();
        drop(tree);
        log::debug!(
            "add: {} [{} clause(s)] -> queue {}",
            item.entry_point,
            item.path.len(),
            qn
        );
        st.queues[qn].push_back(item);
        Ok(())
    }

    /// Weighted-random dequeue.
    ///
    /// Draws a starting rank from the probability table, scans from there
    /// toward the worst queue for the first non-empty one, then falls back
    /// toward the best. When every queue is empty, sleeps at most
    /// `min(timeout, poll_sleep)` and returns `None`; the caller re-polls
    /// (or exits on shutdown) rather than blocking indefinitely.
    pub fn poll(&self, timeout: Duration) -> Option<WorkItem<P>> {
        {
            let mut st = self.state.lock().unwrap();
            let start = self.rank_dist.sample(&mut st.rng);
            for rank in start..self.layout.queue_count() {
                let qn = self.layout.ranking[rank];
                if let Some(item) = st.queues[qn].pop_front() {
                    return Some(item);
                }
            }
            for rank in (0..start).rev() {
                let qn = self.layout.ranking[rank];
                if let Some(item) = st.queues[qn].pop_front() {
                    return Some(item);
                }
            }
        }
        std::thread::sleep(timeout.min(self.cfg.poll_sleep));
        None
    }

    /// Buffers newly covered branches for the next improvability
    /// reclassification pass. No-op when the index is disabled.
    pub fn learn_coverage_for_index_improvability(
        &self,
        branches: impl IntoIterator<Item = BranchId>,
    ) {
        if self.cfg.improvability.is_none() {
            return;
        }
        self.state
            .lock()
            .unwrap()
            .pending_improvability
            .extend(branches);
    }

    /// Buffers hit branches for the next novelty reclassification pass.
    /// No-op when the index is disabled.
    pub fn learn_coverage_for_index_novelty(&self, branches: impl IntoIterator<Item = BranchId>) {
        if self.cfg.novelty.is_none() {
            return;
        }
        self.state.lock().unwrap().pending_novelty.extend(branches);
    }

    /// Buffers a solve outcome for the next infeasibility pass. A solved
    /// outcome is monotonic over prefixes: if a longer path is solvable, so
    /// is every strict prefix that led to it, and each contributes its own
    /// training sample at update time. Outcomes for entry points outside
    /// the configured filter are ignored.
    pub fn learn_path_condition_for_index_infeasibility(
        &self,
        entry: &EntryPointId,
        path: &PathCondition,
        solved: bool,
    ) {
        let Some(inf) = &self.cfg.infeasibility else {
            return;
        };
        if !inf.admits(entry) {
            return;
        }
        self.state
            .lock()
            .unwrap()
            .pending_infeasibility
            .push((entry.clone(), path.clone(), solved));
    }

    /// Re-scores every resident item whose neighbor frontier intersects the
    /// branches covered since the last pass, moving items whose queue class
    /// changed.
    pub fn update_index_improvability_and_reclassify(&self) {
        if self.cfg.improvability.is_none() {
            return;
        }
        let mut tree = self.tree.lock();
        let mut st = self.state.lock().unwrap();
        let touched = std::mem::take(&mut st.pending_improvability);
        if touched.is_empty() {
            return;
        }
        for q in &st.queues {
            for item in q {
                if tree.frontier_intersects(&item.entry_point, &item.path, &touched) {
                    tree.refresh_improvability(&item.entry_point, &item.path);
                }
            }
        }
        self.rebuild_queues(&mut tree, &mut st);
    }

    /// As the improvability pass, for items whose covered-branch set
    /// intersects the branches hit since the last pass.
    pub fn update_index_novelty_and_reclassify(&self) {
        if self.cfg.novelty.is_none() {
            return;
        }
        let mut tree = self.tree.lock();
        let mut st = self.state.lock().unwrap();
        let touched = std::mem::take(&mut st.pending_novelty);
        if touched.is_empty() {
            return;
        }
        for q in &st.queues {
            for item in q {
                if tree.covered_intersects(&item.entry_point, &item.path, &touched) {
                    tree.refresh_novelty(&item.entry_point, &item.path);
                }
            }
        }
        self.rebuild_queues(&mut tree, &mut st);
    }

    /// Converts buffered solve outcomes into training samples and, once the
    /// training set is large enough, re-scores every resident item.
    pub fn update_index_infeasibility_and_reclassify(&self) {
        let Some(inf) = self.cfg.infeasibility.clone() else {
            return;
        };
        let mut tree = self.tree.lock();
        let mut st = self.state.lock().unwrap();
        let outcomes = std::mem::take(&mut st.pending_infeasibility);

        let mut samples = Vec::new();
        for (entry, path, solved) in &outcomes {
            if *solved {
                let mut prefixes: Vec<PathCondition> = path.strict_prefixes().collect();
                prefixes.push(path.clone());
                for p in prefixes {
                    // Interior trie nodes never inserted uncovered carry no
                    // cached signature; the encoding is a pure function of
                    // the path condition, so compute it directly.
                    let sig = tree
                        .signature_of(entry, &p)
                        .unwrap_or_else(|| signature::encode(&p));
                    samples.push(TrainingSample::new(sig, true));
                }
            } else {
                let sig = tree
                    .signature_of(entry, path)
                    .unwrap_or_else(|| signature::encode(path));
                samples.push(TrainingSample::new(sig, false));
            }
        }
        if !samples.is_empty() {
            self.tree.classifier().train(samples);
        }

        if self.tree.classifier().len() >= inf.min_training_set {
            for q in &st.queues {
                for item in q {
                    tree.refresh_infeasibility(
                        &item.entry_point,
                        &item.path,
                        self.tree.classifier(),
                    );
                }
            }
            self.rebuild_queues(&mut tree, &mut st);
        }
    }

    /// Rotates every queue once, re-deriving each item's queue number from
    /// the (just refreshed) caches and appending it to its target queue.
    /// Items that stay put keep their FIFO order; moved items join the tail
    /// of their new queue. A resident item whose path is no longer
    /// computable indicates a producer/consumer protocol violation.
    fn rebuild_queues(&self, tree: &mut TreeInner, st: &mut BufferState<P>) {
        for qn in 0..st.queues.len() {
            for _ in 0..st.queues[qn].len() {
                let item = st.queues[qn].pop_front().unwrap();
                let target = self
                    .queue_number_inner(tree, &item.entry_point, &item.path)
                    .unwrap_or_else(|| {
                        panic!(
                            "resident work item for {} is not indexed in the path tree",
                            item.entry_point
                        )
                    });
                if target != qn {
                    log::debug!(
                        "reclassify: {} [{} clause(s)] queue {} -> {}",
                        item.entry_point,
                        item.path.len(),
                        qn,
                        target
                    );
                }
                st.queues[target].push_back(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BranchFilter, InfeasibilityConfig};
    use crate::path::{Clause, OriginId};
    use std::time::Instant;
    use test_case::test_case;

    fn clause(text: &str) -> Clause {
        Clause::new(text, [OriginId::from("x")])
    }

    fn path(texts: &[&str]) -> PathCondition {
        texts.iter().map(|t| clause(t)).collect()
    }

    fn branches(ids: &[&str]) -> BTreeSet<BranchId> {
        ids.iter().map(|b| BranchId::from(*b)).collect()
    }

    fn entry() -> EntryPointId {
        EntryPointId::from("Target.m(I)V")
    }

    fn improvability_only() -> SchedConfig {
        SchedConfig {
            improvability: Some(BranchFilter::any()),
            novelty: None,
            infeasibility: None,
            ..SchedConfig::default()
        }
    }

    fn novelty_only() -> SchedConfig {
        SchedConfig {
            improvability: None,
            novelty: Some(BranchFilter::any()),
            infeasibility: None,
            ..SchedConfig::default()
        }
    }

    fn infeasibility_only() -> SchedConfig {
        SchedConfig {
            improvability: None,
            novelty: None,
            infeasibility: Some(InfeasibilityConfig::default()),
            ..SchedConfig::default()
        }
    }

    /// Builds a tree/buffer pair and inserts one uncovered frontier path
    /// with the given frontier branches.
    fn setup(
        cfg: SchedConfig,
        frontier: &[&str],
    ) -> (Arc<PathTree>, PriorityBuffer<()>, PathCondition) {
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer = PriorityBuffer::new(tree.clone(), cfg);
        let p = path(&["x > 0", "x < 9"]);
        tree.insert_path(
            &entry(),
            &p,
            &branches(&["b0"]),
            &branches(frontier),
            false,
        );
        (tree, buffer, p)
    }

    #[test_case(SchedConfig::fifo() => 1; "no active index")]
    #[test_case(improvability_only() => 11; "sole improvability")]
    #[test_case(novelty_only() => 11; "sole novelty")]
    #[test_case(infeasibility_only() => 4; "sole infeasibility")]
    #[test_case(SchedConfig { infeasibility: None, ..SchedConfig::default() } => 3; "two active")]
    #[test_case(SchedConfig::default() => 4; "three active")]
    fn queue_counts_per_configuration(cfg: SchedConfig) -> usize {
        PriorityBuffer::<()>::new(Arc::new(PathTree::new(&cfg)), cfg.clone()).queue_count()
    }

    #[test]
    fn queue_number_stays_in_range_for_every_configuration() {
        for cfg in [
            SchedConfig::fifo(),
            improvability_only(),
            novelty_only(),
            infeasibility_only(),
            SchedConfig {
                infeasibility: None,
                ..SchedConfig::default()
            },
            SchedConfig::default(),
        ] {
            let (_tree, buffer, p) = setup(cfg, &["f1", "f2", "f3"]);
            let qn = buffer.calculate_queue_number(&entry(), &p).unwrap();
            assert!(
                qn < buffer.queue_count(),
                "queue {} out of range for {} queues",
                qn,
                buffer.queue_count()
            );
        }
    }

    #[test]
    fn improvability_only_files_by_raw_value() {
        let (_tree, buffer, p) = setup(improvability_only(), &["f1", "f2", "f3"]);
        assert_eq!(buffer.calculate_queue_number(&entry(), &p), Some(3));
        buffer.add(WorkItem::new(entry(), p, ())).unwrap();
        assert_eq!(buffer.queue_sizes()[3], 1);
    }

    #[test]
    fn novelty_only_files_unhit_coverage_at_zero() {
        let (_tree, buffer, p) = setup(novelty_only(), &[]);
        // The path's covered branch b0 has never been hit by a test.
        assert_eq!(buffer.calculate_queue_number(&entry(), &p), Some(0));
    }

    #[test]
    fn unknown_path_is_refused_not_crashed() {
        let cfg = improvability_only();
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<()> = PriorityBuffer::new(tree, cfg);
        let err = buffer
            .add(WorkItem::new(entry(), path(&["nope"]), ()))
            .unwrap_err();
        assert_eq!(err, AddError::NotIndexed);
        assert!(buffer.is_empty());
    }

    #[test]
    fn poll_drains_fifo_within_a_queue() {
        let cfg = SchedConfig::fifo();
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<u32> = PriorityBuffer::new(tree.clone(), cfg);
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            let p = path(&[*text]);
            tree.insert_path(&entry(), &p, &BTreeSet::new(), &BTreeSet::new(), false);
            buffer.add(WorkItem::new(entry(), p, i as u32)).unwrap();
        }
        let order: Vec<u32> = (0..3)
            .map(|_| buffer.poll(Duration::from_millis(10)).unwrap().payload)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(buffer.poll(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn poll_finds_the_single_occupied_queue() {
        // Whatever rank the draw lands on, the forward/backward scan must
        // reach the only non-empty queue.
        let (_tree, buffer, p) = setup(improvability_only(), &["f1"]);
        for _ in 0..20 {
            buffer.add(WorkItem::new(entry(), p.clone(), ())).unwrap();
            assert!(buffer.poll(Duration::from_millis(5)).is_some());
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_poll_returns_within_its_timeout() {
        let cfg = SchedConfig::fifo();
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<()> = PriorityBuffer::new(tree, cfg);
        let start = Instant::now();
        assert!(buffer.poll(Duration::from_millis(20)).is_none());
        // Generous upper bound; the point is that it does not block
        // indefinitely.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn coverage_learning_moves_resident_items() {
        let (tree, buffer, p) = setup(improvability_only(), &["f1", "f2"]);
        buffer.add(WorkItem::new(entry(), p.clone(), ())).unwrap();
        assert_eq!(buffer.queue_sizes()[2], 1);

        // Another path's test covers f1; the resident item's frontier
        // shrinks and it must move from queue 2 to queue 1.
        let other = path(&["y == 1"]);
        let newly = tree.insert_path(&entry(), &other, &branches(&["f1"]), &BTreeSet::new(), true);
        buffer.learn_coverage_for_index_improvability(newly);
        buffer.update_index_improvability_and_reclassify();

        let sizes = buffer.queue_sizes();
        assert_eq!(sizes[2], 0);
        assert_eq!(sizes[1], 1);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn novelty_learning_moves_resident_items() {
        let cfg = novelty_only();
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<()> = PriorityBuffer::new(tree.clone(), cfg);
        let p = path(&["x > 0"]);
        tree.insert_path(&entry(), &p, &branches(&["b1"]), &BTreeSet::new(), false);
        buffer.add(WorkItem::new(entry(), p.clone(), ())).unwrap();
        assert_eq!(buffer.queue_sizes()[0], 1);

        // Two tests traverse b1: its rarity drops.
        for other in [path(&["t1"]), path(&["t2"])] {
            tree.insert_path(&entry(), &other, &branches(&["b1"]), &BTreeSet::new(), true);
        }
        buffer.learn_coverage_for_index_novelty(branches(&["b1"]));
        buffer.update_index_novelty_and_reclassify();

        let sizes = buffer.queue_sizes();
        assert_eq!(sizes[0], 0);
        assert_eq!(sizes[2], 1);
    }

    #[test]
    fn solved_outcome_trains_path_and_strict_prefixes() {
        let cfg = infeasibility_only();
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<()> = PriorityBuffer::new(tree.clone(), cfg);

        let full = path(&["a > 0", "b > 0", "c > 0"]);
        // Every prefix was attempted (uncovered) at some point, so each has
        // a signature.
        for n in 1..=full.len() {
            let p = full.prefix(n);
            tree.insert_path(&entry(), &p, &BTreeSet::new(), &BTreeSet::new(), false);
        }

        buffer.learn_path_condition_for_index_infeasibility(&entry(), &full, true);
        buffer.update_index_infeasibility_and_reclassify();

        // Three distinct feasible samples: the full path and its two strict
        // prefixes.
        assert_eq!(tree.classifier().len(), 3);
    }

    #[test]
    fn solved_outcome_trains_prefixes_without_their_own_insertions() {
        let cfg = infeasibility_only();
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<()> = PriorityBuffer::new(tree.clone(), cfg);

        // Only the full path is ever filed; its strict prefixes exist solely
        // as interior trie nodes with no cached signature.
        let full = path(&["a > 0", "b > 0", "c > 0"]);
        tree.insert_path(&entry(), &full, &BTreeSet::new(), &BTreeSet::new(), false);

        buffer.learn_path_condition_for_index_infeasibility(&entry(), &full, true);
        buffer.update_index_infeasibility_and_reclassify();

        // The full path and both strict prefixes must each contribute a
        // feasible sample regardless.
        assert_eq!(tree.classifier().len(), 3);
    }

    #[test]
    fn entry_filter_gates_infeasibility_learning() {
        let cfg = SchedConfig {
            improvability: None,
            novelty: None,
            infeasibility: Some(InfeasibilityConfig {
                entry_filter: Some(regex::Regex::new(r"^Target\.").unwrap()),
                ..InfeasibilityConfig::default()
            }),
            ..SchedConfig::default()
        };
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<()> = PriorityBuffer::new(tree.clone(), cfg);
        let p = path(&["x > 0"]);
        let outsider = EntryPointId::from("Helper.aux()V");
        tree.insert_path(&outsider, &p, &BTreeSet::new(), &BTreeSet::new(), false);

        buffer.learn_path_condition_for_index_infeasibility(&outsider, &p, false);
        buffer.update_index_infeasibility_and_reclassify();
        assert_eq!(tree.classifier().len(), 0);
    }

    #[test]
    fn infeasibility_reclassify_waits_for_training_minimum() {
        let cfg = infeasibility_only();
        let tree = Arc::new(PathTree::new(&cfg));
        let buffer: PriorityBuffer<()> = PriorityBuffer::new(tree.clone(), cfg);
        let p = path(&["x > 0"]);
        tree.insert_path(&entry(), &p, &BTreeSet::new(), &BTreeSet::new(), false);
        buffer.add(WorkItem::new(entry(), p.clone(), ())).unwrap();
        // Pinned to queue 0 while untrained.
        assert_eq!(buffer.queue_sizes()[0], 1);

        // One unsolved outcome is below the minimum: no move yet.
        buffer.learn_path_condition_for_index_infeasibility(&entry(), &p, false);
        buffer.update_index_infeasibility_and_reclassify();
        assert_eq!(tree.classifier().len(), 1);
        assert_eq!(buffer.queue_sizes()[0], 1);
    }
}
