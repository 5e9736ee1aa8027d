// SPDX-License-Identifier: Apache-2.0

//! The drive loop alternating the two external collaborators.
//!
//! The symbolic-execution collaborator ([`PathSource`]) turns a work item
//! into successor path conditions; the test-generation collaborator
//! ([`TestOracle`]) turns a path condition into a test (or fails to). Both
//! are black boxes, typically wrappers around external processes whose
//! lifecycle is managed by the embedding application; the engine only
//! routes their inputs and outputs through the path tree and the priority
//! buffer and feeds solve outcomes back into the feasibility classifier.
//!
//! Workers observe a shared stop flag between polls, so shutdown never
//! loses an item that is still queued; an item already dequeued belongs to
//! its worker and is processed to completion.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use serde::Serialize;

use crate::buffer::PriorityBuffer;
use crate::config::{EngineConfig, SchedConfig};
use crate::path::{BranchId, EntryPointId, PathCondition, WorkItem};
use crate::path_tree::PathTree;

/// One successor path condition reported by the symbolic-execution
/// collaborator, tagged with the branches it covers, the branches reachable
/// one step beyond it, and the opaque state needed to resume from it.
#[derive(Debug, Clone)]
pub struct DiscoveredPath<P> {
    pub path: PathCondition,
    pub covered_branches: BTreeSet<BranchId>,
    pub frontier_branches: BTreeSet<BranchId>,
    pub payload: P,
}

/// Outcome reported by the test-generation collaborator for one path
/// condition.
#[derive(Debug, Clone)]
pub enum TestOutcome {
    /// A test was generated; `covered_branches` are the branches it
    /// actually exercises when executed.
    Generated { covered_branches: BTreeSet<BranchId> },
    /// No test could be generated for the path's constraints.
    Failed,
}

/// Symbolic-execution collaborator: produces frontier path conditions.
pub trait PathSource: Send + Sync {
    type Payload: Send + 'static;

    /// Initial frontier for an entry point, used to bootstrap a run.
    fn seed(&self, entry: &EntryPointId) -> Result<Vec<DiscoveredPath<Self::Payload>>>;

    /// Successor path conditions of `item` at the requested exploration
    /// depth.
    fn explore(
        &self,
        item: &WorkItem<Self::Payload>,
        depth: usize,
    ) -> Result<Vec<DiscoveredPath<Self::Payload>>>;
}

/// Test-generation collaborator: turns a path condition into a test.
pub trait TestOracle: Send + Sync {
    fn synthesize(&self, entry: &EntryPointId, path: &PathCondition) -> Result<TestOutcome>;
}

/// Run summary: the externally observable metrics of a scheduling run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineReport {
    pub items_processed: u64,
    pub tests_generated: u64,
    pub generation_failures: u64,
    pub paths_discovered: u64,
    pub branches_covered: usize,
}

impl EngineReport {
    fn merge(&mut self, other: &EngineReport) {
        self.items_processed += other.items_processed;
        self.tests_generated += other.tests_generated;
        self.generation_failures += other.generation_failures;
        self.paths_discovered += other.paths_discovered;
    }
}

/// Multi-threaded scheduler engine wiring the collaborators to the shared
/// path tree and priority buffer.
pub struct SchedEngine<S: PathSource, O: TestOracle> {
    tree: Arc<PathTree>,
    buffer: Arc<PriorityBuffer<S::Payload>>,
    source: Arc<S>,
    oracle: Arc<O>,
    cfg: EngineConfig,
    stop: Arc<AtomicBool>,
    processed: AtomicU64,
}

impl<S: PathSource, O: TestOracle> SchedEngine<S, O> {
    pub fn new(sched_cfg: SchedConfig, cfg: EngineConfig, source: S, oracle: O) -> Self {
        let tree = Arc::new(PathTree::new(&sched_cfg));
        let buffer = Arc::new(PriorityBuffer::new(tree.clone(), sched_cfg));
        SchedEngine {
            tree,
            buffer,
            source: Arc::new(source),
            oracle: Arc::new(oracle),
            cfg,
            stop: Arc::new(AtomicBool::new(false)),
            processed: AtomicU64::new(0),
        }
    }

    pub fn tree(&self) -> &Arc<PathTree> {
        &self.tree
    }

    pub fn buffer(&self) -> &Arc<PriorityBuffer<S::Payload>> {
        &self.buffer
    }

    /// Shared shutdown flag; setting it makes every worker exit after its
    /// current item.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Bootstraps the run by asking the symbolic-execution collaborator for
    /// the initial frontier of `entry` and filing it. Returns the number of
    /// work items filed.
    pub fn seed_entry(&self, entry: &EntryPointId) -> Result<usize> {
        let discovered = self.source.seed(entry)?;
        let mut filed = 0usize;
        for d in discovered {
            if self.file_discovered(entry, d) {
                filed += 1;
            }
        }
        log::info!("seeded {} with {} work item(s)", entry, filed);
        Ok(filed)
    }

    /// Inserts a discovered frontier path (uncovered) and files it in the
    /// buffer. Returns false when the buffer refused the item.
    fn file_discovered(&self, entry: &EntryPointId, d: DiscoveredPath<S::Payload>) -> bool {
        self.tree.insert_path(
            entry,
            &d.path,
            &d.covered_branches,
            &d.frontier_branches,
            false,
        );
        let item = WorkItem::new(entry.clone(), d.path, d.payload);
        match self.buffer.add(item) {
            Ok(()) => true,
            Err(e) => {
                // Defer-don't-crash: the item is dropped, not fatal.
                log::warn!("buffer refused work item for {}: {}", entry, e);
                false
            }
        }
    }

    /// Runs worker threads until the buffer drains, the item cap is hit, or
    /// the stop flag is raised. Returns the merged run report.
    pub fn run(&self) -> EngineReport {
        let workers = self.cfg.workers.max(1);
        let mut report = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|w| s.spawn(move || self.worker_loop(w)))
                .collect();
            let mut merged = EngineReport::default();
            for h in handles {
                let r = h.join().expect("worker thread panicked");
                merged.merge(&r);
            }
            merged
        });
        report.branches_covered = self.tree.total_covered();
        match serde_json::to_string(&report) {
            Ok(json) => log::info!("run report: {}", json),
            Err(e) => log::warn!("run report serialization failed: {}", e),
        }
        report
    }

    fn item_cap_reached(&self) -> bool {
        match self.cfg.max_items {
            Some(max) => self.processed.load(Ordering::SeqCst) >= max,
            None => false,
        }
    }

    fn worker_loop(&self, worker_no: usize) -> EngineReport {
        let mut report = EngineReport::default();
        let mut idle_polls = 0usize;
        let mut since_reclassify = 0usize;

        while !self.stop.load(Ordering::SeqCst) && !self.item_cap_reached() {
            let Some(item) = self.buffer.poll(self.cfg.poll_timeout) else {
                idle_polls += 1;
                if idle_polls >= self.cfg.max_idle_polls {
                    log::debug!("worker {}: drained after {} empty polls", worker_no, idle_polls);
                    break;
                }
                continue;
            };
            idle_polls = 0;
            self.processed.fetch_add(1, Ordering::SeqCst);
            report.items_processed += 1;
            self.process_item(&item, &mut report);

            since_reclassify += 1;
            if since_reclassify >= self.cfg.reclassify_every {
                self.buffer.update_index_improvability_and_reclassify();
                self.buffer.update_index_novelty_and_reclassify();
                self.buffer.update_index_infeasibility_and_reclassify();
                since_reclassify = 0;
            }
        }
        report
    }

    fn process_item(&self, item: &WorkItem<S::Payload>, report: &mut EngineReport) {
        match self.oracle.synthesize(&item.entry_point, &item.path) {
            Ok(TestOutcome::Generated { covered_branches }) => {
                report.tests_generated += 1;
                let newly = self.tree.insert_path(
                    &item.entry_point,
                    &item.path,
                    &covered_branches,
                    &BTreeSet::new(),
                    true,
                );
                self.buffer.learn_path_condition_for_index_infeasibility(
                    &item.entry_point,
                    &item.path,
                    true,
                );
                if !newly.is_empty() {
                    self.buffer
                        .learn_coverage_for_index_improvability(newly.iter().cloned());
                }
                self.buffer
                    .learn_coverage_for_index_novelty(covered_branches.iter().cloned());

                match self.source.explore(item, self.cfg.exploration_depth) {
                    Ok(successors) => {
                        for d in successors {
                            report.paths_discovered += 1;
                            self.file_discovered(&item.entry_point, d);
                        }
                    }
                    Err(e) => {
                        log::warn!(
                            "symbolic exploration failed for {}: {:#}",
                            item.entry_point,
                            e
                        );
                    }
                }
            }
            Ok(TestOutcome::Failed) => {
                report.generation_failures += 1;
                self.learn_failure(item);
            }
            Err(e) => {
                // Collaborator crash or malformed output: the item is
                // dropped after logging; the failure still trains the
                // classifier.
                log::warn!("test generation failed for {}: {:#}", item.entry_point, e);
                report.generation_failures += 1;
                self.learn_failure(item);
            }
        }
    }

    fn learn_failure(&self, item: &WorkItem<S::Payload>) {
        self.buffer.learn_path_condition_for_index_infeasibility(
            &item.entry_point,
            &item.path,
            false,
        );
        self.buffer.update_index_infeasibility_and_reclassify();
    }
}
