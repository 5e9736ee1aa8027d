// SPDX-License-Identifier: Apache-2.0

//! The path-condition tree: system of record for what has been explored and
//! covered.
//!
//! A concurrent trie keyed by ordered clause sequences, one root per entry
//! point. Nodes carry coverage status, branch sets, a cached similarity
//! signature and lazily cached heuristic index values. The whole structure
//! sits behind one coarse lock: structural inserts are infrequent compared
//! to index reads, and reclassification must see a consistent multi-node
//! snapshot (documented lock order is tree before buffer).
//!
//! Unknown-path queries return `None` rather than failing; callers treat
//! that as "not yet ready to score" and defer.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use regex::Regex;

use crate::classifier::{FeasibilityClassifier, MIN_TRAINING_SAMPLES};
use crate::config::{BranchFilter, SchedConfig};
use crate::path::{BranchId, Clause, EntryPointId, PathCondition};
use crate::signature::{self, Signature};

/// Exploration status of a node. Monotonic: once `Covered`, never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// An exploration attempt for this path exists, but no test has covered
    /// it yet.
    Attempted,
    /// A generated test demonstrably traverses this path.
    Covered,
}

/// Heuristic values cached on a node, lazily populated.
#[derive(Debug, Clone, Copy, Default)]
struct IndexCache {
    improvability: Option<u8>,
    novelty: Option<u8>,
    infeasibility: Option<u8>,
}

type NodeId = usize;

#[derive(Debug)]
struct Node {
    status: NodeStatus,
    /// Branches actually exercised by a test that produced this exact path.
    covered_branches: BTreeSet<BranchId>,
    /// Branches reachable one step beyond this path (the neighbor
    /// frontier), feeding the improvability index.
    frontier_branches: BTreeSet<BranchId>,
    /// Present once an uncovered exploration attempt for this path has been
    /// recorded.
    signature: Option<Signature>,
    cache: IndexCache,
    children: HashMap<Clause, NodeId>,
}

impl Node {
    fn new() -> Self {
        Node {
            status: NodeStatus::Attempted,
            covered_branches: BTreeSet::new(),
            frontier_branches: BTreeSet::new(),
            signature: None,
            cache: IndexCache::default(),
            children: HashMap::new(),
        }
    }
}

/// Caps applied to the improvability and novelty indices.
const INDEX_CAP: u8 = 10;

pub(crate) struct TreeInner {
    nodes: Vec<Node>,
    roots: HashMap<EntryPointId, NodeId>,
    /// Branches known covered anywhere in the tree.
    covered: BTreeSet<BranchId>,
    /// Branch -> number of tests observed to traverse it. Monotonic.
    hits: HashMap<BranchId, u64>,
    improvability_filter: BranchFilter,
    novelty_filter: BranchFilter,
}

impl TreeInner {
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    fn walk(&self, entry: &EntryPointId, path: &PathCondition) -> Option<NodeId> {
        let mut id = *self.roots.get(entry)?;
        for clause in path.clauses() {
            id = *self.node(id).children.get(clause)?;
        }
        Some(id)
    }

    fn ensure_root(&mut self, entry: &EntryPointId) -> NodeId {
        if let Some(id) = self.roots.get(entry) {
            return *id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node::new());
        self.roots.insert(entry.clone(), id);
        id
    }

    pub(crate) fn insert_path(
        &mut self,
        entry: &EntryPointId,
        path: &PathCondition,
        covered_branches: &BTreeSet<BranchId>,
        frontier_branches: &BTreeSet<BranchId>,
        covered: bool,
    ) -> BTreeSet<BranchId> {
        let mut id = self.ensure_root(entry);
        if covered {
            self.nodes[id].status = NodeStatus::Covered;
        }
        for clause in path.clauses() {
            let next = match self.nodes[id].children.get(clause) {
                Some(child) => *child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::new());
                    self.nodes[id].children.insert(clause.clone(), child);
                    child
                }
            };
            id = next;
            if covered {
                self.nodes[id].status = NodeStatus::Covered;
            }
        }

        let newly: BTreeSet<BranchId> = covered_branches
            .iter()
            .filter(|b| !self.covered.contains(*b))
            .cloned()
            .collect();

        {
            let terminal = &mut self.nodes[id];
            terminal
                .covered_branches
                .extend(covered_branches.iter().cloned());
            terminal
                .frontier_branches
                .extend(frontier_branches.iter().cloned());
            if !covered && terminal.signature.is_none() {
                terminal.signature = Some(signature::encode(path));
            }
        }

        if covered {
            for b in covered_branches {
                *self.hits.entry(b.clone()).or_insert(0) += 1;
            }
            self.covered.extend(covered_branches.iter().cloned());
            self.invalidate_after_coverage(&newly, covered_branches);
            log::debug!(
                "covered insert for {}: {} clause(s), {} newly covered branch(es)",
                entry,
                path.len(),
                newly.len()
            );
        }

        newly
    }

    /// Coverage changes make cached coverage-based indices stale: an
    /// improvability cache is stale when its frontier contains a newly
    /// covered branch, a novelty cache whenever a hit count it consulted
    /// moved.
    fn invalidate_after_coverage(
        &mut self,
        newly_covered: &BTreeSet<BranchId>,
        hit_branches: &BTreeSet<BranchId>,
    ) {
        for node in &mut self.nodes {
            if node.cache.improvability.is_some()
                && node.frontier_branches.iter().any(|b| newly_covered.contains(b))
            {
                node.cache.improvability = None;
            }
            if node.cache.novelty.is_some()
                && node.covered_branches.iter().any(|b| hit_branches.contains(b))
            {
                node.cache.novelty = None;
            }
        }
    }

    pub(crate) fn contains(
        &self,
        entry: &EntryPointId,
        path: &PathCondition,
        covered: bool,
    ) -> bool {
        let Some(root) = self.roots.get(entry) else {
            return false;
        };
        let mut id = *root;
        if covered && self.node(id).status != NodeStatus::Covered {
            return false;
        }
        for clause in path.clauses() {
            match self.node(id).children.get(clause) {
                Some(child) => id = *child,
                None => return false,
            }
            if covered && self.node(id).status != NodeStatus::Covered {
                return false;
            }
        }
        true
    }

    fn compute_improvability(&self, id: NodeId) -> u8 {
        let node = self.node(id);
        let fresh = node
            .frontier_branches
            .iter()
            .filter(|b| self.improvability_filter.matches(b) && !self.covered.contains(*b))
            .count();
        fresh.min(INDEX_CAP as usize) as u8
    }

    fn compute_novelty(&self, id: NodeId) -> u8 {
        let node = self.node(id);
        let mut min_hits: Option<u64> = None;
        for b in &node.covered_branches {
            if !self.novelty_filter.matches(b) {
                continue;
            }
            let h = self.hits.get(b).copied().unwrap_or(0);
            min_hits = Some(min_hits.map_or(h, |m| m.min(h)));
        }
        match min_hits {
            // No coverage evidence: no novelty claim.
            None => INDEX_CAP,
            Some(h) => h.min(u64::from(INDEX_CAP)) as u8,
        }
    }

    pub(crate) fn improvability(
        &mut self,
        entry: &EntryPointId,
        path: &PathCondition,
    ) -> Option<u8> {
        let id = self.walk(entry, path)?;
        if let Some(v) = self.node(id).cache.improvability {
            return Some(v);
        }
        let v = self.compute_improvability(id);
        self.nodes[id].cache.improvability = Some(v);
        Some(v)
    }

    pub(crate) fn refresh_improvability(
        &mut self,
        entry: &EntryPointId,
        path: &PathCondition,
    ) -> Option<u8> {
        let id = self.walk(entry, path)?;
        let v = self.compute_improvability(id);
        self.nodes[id].cache.improvability = Some(v);
        Some(v)
    }

    pub(crate) fn novelty(&mut self, entry: &EntryPointId, path: &PathCondition) -> Option<u8> {
        let id = self.walk(entry, path)?;
        if let Some(v) = self.node(id).cache.novelty {
            return Some(v);
        }
        let v = self.compute_novelty(id);
        self.nodes[id].cache.novelty = Some(v);
        Some(v)
    }

    pub(crate) fn refresh_novelty(
        &mut self,
        entry: &EntryPointId,
        path: &PathCondition,
    ) -> Option<u8> {
        let id = self.walk(entry, path)?;
        let v = self.compute_novelty(id);
        self.nodes[id].cache.novelty = Some(v);
        Some(v)
    }

    pub(crate) fn infeasibility(
        &mut self,
        entry: &EntryPointId,
        path: &PathCondition,
        classifier: &FeasibilityClassifier,
    ) -> Option<u8> {
        let id = self.walk(entry, path)?;
        // Below the minimum training-set size the classifier has nothing to
        // say; the index is pinned to 0 and deliberately not cached so the
        // first real classification is not shadowed.
        if classifier.len() < MIN_TRAINING_SAMPLES {
            return Some(0);
        }
        if let Some(v) = self.node(id).cache.infeasibility {
            return Some(v);
        }
        let sig = self.node(id).signature?;
        let v = classifier.classify(&sig).infeasibility_index();
        self.nodes[id].cache.infeasibility = Some(v);
        Some(v)
    }

    pub(crate) fn refresh_infeasibility(
        &mut self,
        entry: &EntryPointId,
        path: &PathCondition,
        classifier: &FeasibilityClassifier,
    ) -> Option<u8> {
        let id = self.walk(entry, path)?;
        if classifier.len() < MIN_TRAINING_SAMPLES {
            return Some(0);
        }
        let sig = self.node(id).signature?;
        let v = classifier.classify(&sig).infeasibility_index();
        self.nodes[id].cache.infeasibility = Some(v);
        Some(v)
    }

    pub(crate) fn signature_of(
        &self,
        entry: &EntryPointId,
        path: &PathCondition,
    ) -> Option<Signature> {
        let id = self.walk(entry, path)?;
        self.node(id).signature
    }

    /// True when the node's frontier intersects `branches`. Used to limit an
    /// improvability reclassification pass to affected items.
    pub(crate) fn frontier_intersects(
        &self,
        entry: &EntryPointId,
        path: &PathCondition,
        branches: &BTreeSet<BranchId>,
    ) -> bool {
        match self.walk(entry, path) {
            Some(id) => self
                .node(id)
                .frontier_branches
                .iter()
                .any(|b| branches.contains(b)),
            None => false,
        }
    }

    /// True when the node's covered-branch set intersects `branches`. Used
    /// to limit a novelty reclassification pass to affected items.
    pub(crate) fn covered_intersects(
        &self,
        entry: &EntryPointId,
        path: &PathCondition,
        branches: &BTreeSet<BranchId>,
    ) -> bool {
        match self.walk(entry, path) {
            Some(id) => self
                .node(id)
                .covered_branches
                .iter()
                .any(|b| branches.contains(b)),
            None => false,
        }
    }

    pub(crate) fn total_covered(&self) -> usize {
        self.covered.len()
    }

    pub(crate) fn total_covered_matching(&self, pattern: &Regex) -> usize {
        self.covered
            .iter()
            .filter(|b| pattern.is_match(b.as_str()))
            .count()
    }

    pub(crate) fn hit_count(&self, branch: &BranchId) -> u64 {
        self.hits.get(branch).copied().unwrap_or(0)
    }
}

/// Shared, internally synchronized path-condition tree.
pub struct PathTree {
    inner: Mutex<TreeInner>,
    classifier: FeasibilityClassifier,
}

impl PathTree {
    pub fn new(cfg: &SchedConfig) -> Self {
        PathTree {
            inner: Mutex::new(TreeInner {
                nodes: Vec::new(),
                roots: HashMap::new(),
                covered: BTreeSet::new(),
                hits: HashMap::new(),
                improvability_filter: cfg.improvability.clone().unwrap_or_default(),
                novelty_filter: cfg.novelty.clone().unwrap_or_default(),
            }),
            classifier: FeasibilityClassifier::new(),
        }
    }

    /// The classifier fed by solve outcomes. Lock order when combined with
    /// the tree lock is tree before classifier.
    pub fn classifier(&self) -> &FeasibilityClassifier {
        &self.classifier
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TreeInner> {
        self.inner.lock().unwrap()
    }

    /// Walks/extends the trie for `path` under `entry`.
    ///
    /// With `covered == true` every node on the walked path is marked
    /// `Covered` (monotonic) and the global hit counter is bumped for each
    /// covered branch; with `covered == false` the terminal node gets its
    /// similarity signature computed and cached. Either way the terminal
    /// node unions in both branch sets.
    ///
    /// Returns the subset of `covered_branches` that were not previously
    /// known covered anywhere in the tree.
    pub fn insert_path(
        &self,
        entry: &EntryPointId,
        path: &PathCondition,
        covered_branches: &BTreeSet<BranchId>,
        frontier_branches: &BTreeSet<BranchId>,
        covered: bool,
    ) -> BTreeSet<BranchId> {
        self.lock()
            .insert_path(entry, path, covered_branches, frontier_branches, covered)
    }

    /// Existence check; with `covered == true` additionally requires every
    /// node walked (root included) to be `Covered`.
    pub fn contains_path(&self, entry: &EntryPointId, path: &PathCondition, covered: bool) -> bool {
        self.lock().contains(entry, path, covered)
    }

    /// `min(|frontier \ globally covered|, 10)` for the terminal node, with
    /// the configured branch filter applied; `None` for an unknown path.
    pub fn improvability_index(&self, entry: &EntryPointId, path: &PathCondition) -> Option<u8> {
        self.lock().improvability(entry, path)
    }

    /// Minimum hit count over the terminal node's covered branches, capped
    /// at 10; lower means rarer. `None` for an unknown path.
    pub fn novelty_index(&self, entry: &EntryPointId, path: &PathCondition) -> Option<u8> {
        self.lock().novelty(entry, path)
    }

    /// Classifier-derived 0..=3 feasibility confidence; 0 while the training
    /// set is smaller than the minimum; `None` for an unknown path or one
    /// without a signature.
    pub fn infeasibility_index(&self, entry: &EntryPointId, path: &PathCondition) -> Option<u8> {
        self.lock().infeasibility(entry, path, &self.classifier)
    }

    /// Count of distinct branches known covered anywhere in the tree.
    pub fn total_covered(&self) -> usize {
        self.lock().total_covered()
    }

    /// As [`PathTree::total_covered`], filtered by a branch-id pattern.
    pub fn total_covered_matching(&self, pattern: &Regex) -> usize {
        self.lock().total_covered_matching(pattern)
    }

    /// Number of tests observed to traverse `branch`.
    pub fn hit_count(&self, branch: &BranchId) -> u64 {
        self.lock().hit_count(branch)
    }
}
