// SPDX-License-Identifier: Apache-2.0

//! Scheduling and prioritization core for hybrid concolic test generation.
//!
//! A hybrid concolic generator alternates a symbolic-execution stage that
//! produces path conditions with a search-based stage that turns path
//! conditions into executable tests, feeding discovered tests back into
//! symbolic execution to explore neighboring branches. This crate is the
//! layer in between: it decides, among a large and growing population of
//! pending path conditions, which ones are worth exploring next, and makes
//! that decision cheap and consistent under concurrent access.
//!
//! The pieces:
//!
//! - [`path_tree::PathTree`] — a concurrent trie over ordered constraint
//!   sequences, the system of record for what has been explored and
//!   covered, with per-path heuristic caches and similarity signatures.
//! - [`buffer::PriorityBuffer`] — partitioned FIFO queues keyed by an
//!   integer priority class derived from up to three togglable heuristics
//!   (improvability, novelty, infeasibility), drained by weighted-random
//!   selection with graceful degradation.
//! - [`classifier::FeasibilityClassifier`] — a nearest-neighbor feasibility
//!   predictor over compact bit-matrix signatures, trained online from
//!   solve outcomes.
//! - [`signature`] — dependency slicing of a path condition down to the
//!   clauses relevant to its last clause, hashed into a fixed 16x64 bit
//!   matrix.
//! - [`engine::SchedEngine`] — the drive loop wiring the two external
//!   collaborators (symbolic executor, test generator) to the tree and the
//!   buffer.
//!
//! Constraint solving, bytecode interpretation and test synthesis live in
//! the collaborators; this crate only represents, scores, stores and hands
//! out pending exploration tasks.

pub mod buffer;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod path;
pub mod path_tree;
pub mod signature;

pub use buffer::{AddError, PriorityBuffer};
pub use classifier::{Classification, FeasibilityClassifier, Label, TrainingSample};
pub use config::{BranchFilter, EngineConfig, InfeasibilityConfig, SchedConfig};
pub use engine::{DiscoveredPath, EngineReport, PathSource, SchedEngine, TestOracle, TestOutcome};
pub use path::{BranchId, Clause, EntryPointId, OriginId, PathCondition, WorkItem};
pub use path_tree::PathTree;
pub use signature::Signature;
