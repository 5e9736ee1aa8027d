// SPDX-License-Identifier: Apache-2.0

//! Nearest-neighbor feasibility classifier.
//!
//! Maintains an unbounded set of `(signature, label)` training samples fed
//! online from actual solve outcomes, and answers 3-nearest-neighbor queries
//! against a new signature. The zero-similarity corner cases below are
//! inherited behavior: downstream queue thresholds depend on their exact
//! outputs, so they are preserved as-is rather than re-derived.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::signature::Signature;

/// Minimum number of training samples before classification is meaningful.
/// Below this the infeasibility index is pinned to 0 without consulting the
/// classifier.
pub const MIN_TRAINING_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Feasible,
    Infeasible,
}

/// One training observation. Set semantics: duplicate samples collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrainingSample {
    pub signature: Signature,
    pub feasible: bool,
}

impl TrainingSample {
    pub fn new(signature: Signature, feasible: bool) -> Self {
        TrainingSample { signature, feasible }
    }
}

/// Typed classification result.
///
/// `voting` is the strength of the majority (2 or 3). The pair
/// `(Infeasible, 3)` doubles as the "no information" answer for degenerate
/// zero-similarity neighborhoods; both map to infeasibility index 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: Label,
    pub voting: u8,
    pub average_similarity: f64,
}

impl Classification {
    fn new(label: Label, voting: u8, average_similarity: f64) -> Self {
        debug_assert!(voting == 2 || voting == 3);
        Classification {
            label,
            voting,
            average_similarity,
        }
    }

    /// Maps the classification onto the 0..=3 infeasibility index consumed
    /// by the priority buffer. Monotonic in confidence of feasibility.
    pub fn infeasibility_index(&self) -> u8 {
        match (self.label, self.voting) {
            (Label::Infeasible, 3) => 0,
            (Label::Infeasible, _) => 1,
            (Label::Feasible, 2) => 2,
            (Label::Feasible, _) => 3,
        }
    }
}

/// Online-trained k-NN classifier (k = 3) over bit-matrix signatures.
///
/// Training appends are safe under concurrent insertion; `classify` observes
/// some consistent snapshot of the set (stale-by-one-sample reads are fine
/// given the heuristic nature of the index).
#[derive(Debug, Default)]
pub struct FeasibilityClassifier {
    samples: Mutex<HashSet<TrainingSample>>,
}

impl FeasibilityClassifier {
    pub fn new() -> Self {
        FeasibilityClassifier::default()
    }

    /// Adds samples to the training set. Idempotent per distinct
    /// `(signature, label)` pair.
    pub fn train(&self, samples: impl IntoIterator<Item = TrainingSample>) {
        let mut set = self.samples.lock().unwrap();
        for s in samples {
            set.insert(s);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Classifies `query` against the 3 most similar training samples.
    ///
    /// Corner cases, evaluated before the general majority rule:
    /// - 2 or 3 of the top-3 similarities are exactly zero: the neighborhood
    ///   carries no information; returns `(Infeasible, voting = 3)`.
    /// - exactly 1 is zero: decide on the two remaining neighbors. If their
    ///   labels disagree the answer is again `(Infeasible, 3)`; if they
    ///   agree, that label with voting 2.
    /// - otherwise: majority label of the 3 neighbors, voting = majority
    ///   count.
    ///
    /// With fewer than 3 samples overall there is no meaningful
    /// neighborhood; callers gate on [`MIN_TRAINING_SAMPLES`], and this
    /// returns the no-information answer if called anyway.
    pub fn classify(&self, query: &Signature) -> Classification {
        let set = self.samples.lock().unwrap();
        let mut scored: Vec<(f64, bool)> = set
            .iter()
            .map(|s| (query.similarity(&s.signature), s.feasible))
            .collect();
        drop(set);

        // Stable sort: ties keep training-set iteration order, which is all
        // the tie-breaking the algorithm promises.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());

        if scored.len() < MIN_TRAINING_SAMPLES {
            let avg = if scored.is_empty() {
                0.0
            } else {
                scored.iter().map(|(s, _)| s).sum::<f64>() / scored.len() as f64
            };
            return Classification::new(Label::Infeasible, 3, avg);
        }

        let top = &scored[..3];
        let average = top.iter().map(|(s, _)| s).sum::<f64>() / 3.0;
        let zeros = top.iter().filter(|(s, _)| *s == 0.0).count();

        match zeros {
            2 | 3 => Classification::new(Label::Infeasible, 3, average),
            1 => {
                let nonzero: Vec<bool> = top
                    .iter()
                    .filter(|(s, _)| *s != 0.0)
                    .map(|(_, feasible)| *feasible)
                    .collect();
                debug_assert_eq!(nonzero.len(), 2);
                if nonzero[0] != nonzero[1] {
                    Classification::new(Label::Infeasible, 3, average)
                } else if nonzero[0] {
                    Classification::new(Label::Feasible, 2, average)
                } else {
                    Classification::new(Label::Infeasible, 2, average)
                }
            }
            _ => {
                let feasible_votes = top.iter().filter(|(_, feasible)| *feasible).count() as u8;
                if feasible_votes >= 2 {
                    Classification::new(Label::Feasible, feasible_votes, average)
                } else {
                    Classification::new(Label::Infeasible, 3 - feasible_votes, average)
                }
            }
        }
    }
}
