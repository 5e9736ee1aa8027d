// SPDX-License-Identifier: Apache-2.0

//! Core data model for the scheduling layer: clauses, path conditions,
//! branch/entry-point identifiers and work items.
//!
//! Clauses are opaque to this crate: we compare them by value, hash them, and
//! thread them through dependency slicing, but never interpret their
//! semantics. The symbolic-execution collaborator is responsible for
//! producing them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a symbolic-value container (an "origin") referenced by a
/// clause. Two clauses are dependency-linked when their origin sets
/// intersect.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OriginId(pub String);

impl OriginId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OriginId {
    fn from(s: &str) -> Self {
        OriginId(s.to_string())
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One atomic constraint of a path condition.
///
/// `text` is the literal rendering used by the signature encoder; `origins`
/// is the set of symbolic-value containers the clause references.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub text: String,
    pub origins: BTreeSet<OriginId>,
}

impl Clause {
    pub fn new(text: impl Into<String>, origins: impl IntoIterator<Item = OriginId>) -> Self {
        Clause {
            text: text.into(),
            origins: origins.into_iter().collect(),
        }
    }

    /// True iff the two clauses reference at least one common origin.
    pub fn shares_origin_with(&self, other: &Clause) -> bool {
        // Origin sets are small; a linear probe over the smaller set beats
        // building an intersection.
        let (small, large) = if self.origins.len() <= other.origins.len() {
            (&self.origins, &other.origins)
        } else {
            (&other.origins, &self.origins)
        };
        small.iter().any(|o| large.contains(o))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// An ordered sequence of clauses, root to leaf, characterizing one
/// execution path. The prefix relation is positional: `a` is a prefix of `b`
/// iff `a`'s clause sequence is an initial segment of `b`'s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathCondition {
    clauses: Vec<Clause>,
}

impl PathCondition {
    pub fn new(clauses: Vec<Clause>) -> Self {
        PathCondition { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn last(&self) -> Option<&Clause> {
        self.clauses.last()
    }

    /// The prefix consisting of the first `len` clauses.
    pub fn prefix(&self, len: usize) -> PathCondition {
        assert!(len <= self.clauses.len(), "prefix length out of range");
        PathCondition {
            clauses: self.clauses[..len].to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &PathCondition) -> bool {
        self.clauses.len() <= other.clauses.len()
            && other.clauses[..self.clauses.len()] == self.clauses[..]
    }

    /// Non-empty strict prefixes, shortest first.
    pub fn strict_prefixes(&self) -> impl Iterator<Item = PathCondition> + '_ {
        (1..self.clauses.len()).map(move |n| self.prefix(n))
    }
}

impl FromIterator<Clause> for PathCondition {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self {
        PathCondition {
            clauses: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for PathCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{}", c.text)?;
        }
        Ok(())
    }
}

/// Identifier of one branch of the program under test.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchId(pub String);

impl BranchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        BranchId(s.to_string())
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a target entry point (method signature). Path conditions
/// for different entry points are logically partitioned; all tree and buffer
/// operations are keyed by `(EntryPointId, PathCondition)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryPointId(pub String);

impl EntryPointId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryPointId {
    fn from(s: &str) -> Self {
        EntryPointId(s.to_string())
    }
}

impl fmt::Display for EntryPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pending exploration task.
///
/// `payload` is whatever opaque state the symbolic-execution collaborator
/// needs to resume from this path; the scheduler only carries it. A work item
/// is filed into exactly one priority queue and is moved (never duplicated)
/// when rescoring changes its queue class.
#[derive(Debug, Clone)]
pub struct WorkItem<P> {
    pub entry_point: EntryPointId,
    pub path: PathCondition,
    pub payload: P,
}

impl<P> WorkItem<P> {
    pub fn new(entry_point: EntryPointId, path: PathCondition, payload: P) -> Self {
        WorkItem {
            entry_point,
            path,
            payload,
        }
    }
}
