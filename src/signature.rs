// SPDX-License-Identifier: Apache-2.0

//! Similarity signatures for path conditions.
//!
//! A signature is a fixed 16x64 bit matrix produced in two steps:
//!
//! 1. *Slice*: keep only the clauses that transitively influence the last
//!    clause of the path condition, where "influences" means sharing a
//!    symbolic origin. The closure is computed by repeated relaxation over
//!    the clause sequence so indirect chains (A depends on B depends on C)
//!    are captured.
//! 2. *Hash*: render each surviving clause both literally ("specific") and
//!    with decimal digits stripped ("general"), then for three fixed prime
//!    seeds set `bit[0][general_col]` and `bit[specific_row + 1][general_col]`.
//!
//! Row 0 records which general-shape buckets are touched at all; rows 1..=15
//! refine by specific-value bucket, so the classifier can tell apart
//! structurally similar but numerically different path conditions without
//! storing unbounded identifiers.

use std::collections::BTreeSet;
use std::fmt;

use crate::path::{Clause, OriginId, PathCondition};

pub const SIGNATURE_ROWS: usize = 16;
pub const SIGNATURE_COLS: usize = 64;

/// The three seeds used for the co-occurrence hashing. Small fixed primes;
/// changing them changes every stored signature, so they are not
/// configurable.
const HASH_SEEDS: [u64; 3] = [3, 5, 7];

/// Fixed-size bit matrix encoding of a sliced path condition. Row `r` is the
/// bit `r * 64 + c` convention packed as one `u64` per row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    rows: [u64; SIGNATURE_ROWS],
}

impl Signature {
    /// The all-zero signature: encoding of an empty (or fully sliced-away)
    /// path condition.
    pub fn empty() -> Self {
        Signature::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| *r == 0)
    }

    fn set(&mut self, row: usize, col: usize) {
        debug_assert!(row < SIGNATURE_ROWS && col < SIGNATURE_COLS);
        self.rows[row] |= 1u64 << col;
    }

    pub fn bit(&self, row: usize, col: usize) -> bool {
        debug_assert!(row < SIGNATURE_ROWS && col < SIGNATURE_COLS);
        self.rows[row] & (1u64 << col) != 0
    }

    pub fn popcount(&self) -> u32 {
        self.rows.iter().map(|r| r.count_ones()).sum()
    }

    /// Jaccard-style bit similarity: `both / (both + at_least_one)`, where
    /// `both` counts positions set in both matrices and `at_least_one`
    /// counts positions set in exactly one. Two all-zero signatures have no
    /// evidence either way and score 0.0 (the degenerate case the classifier
    /// handles explicitly).
    pub fn similarity(&self, other: &Signature) -> f64 {
        let mut both = 0u32;
        let mut exactly_one = 0u32;
        for (a, b) in self.rows.iter().zip(other.rows.iter()) {
            both += (a & b).count_ones();
            exactly_one += (a ^ b).count_ones();
        }
        let denom = both + exactly_one;
        if denom == 0 {
            0.0
        } else {
            f64::from(both) / f64::from(denom)
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature[")?;
        for (i, r) in self.rows.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:016x}", r)?;
        }
        write!(f, "]")
    }
}

/// Seeded string bucket: blake3 with a domain prefix and the seed mixed in,
/// truncated to a u64. Deterministic across runs and platforms, unlike the
/// std `DefaultHasher`.
fn bucket(text: &str, seed: u64, modulus: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"concolic-sched:sig");
    hasher.update(&seed.to_le_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let word = u64::from_le_bytes(digest.as_bytes()[0..8].try_into().unwrap());
    word % modulus
}

/// The "general" rendering of a clause: its text with all ASCII decimal
/// digits stripped, collapsing distinct numeric identifiers of structurally
/// identical clauses.
fn general_text(clause: &Clause) -> String {
    clause.text.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Keeps the clauses that transitively influence the last clause of `path`
/// through shared origins, preserving their relative order. Fixed point is
/// reached after at most `path.len()` relaxation passes.
pub fn slice_to_last(path: &PathCondition) -> Vec<&Clause> {
    let clauses = path.clauses();
    let Some(last) = clauses.last() else {
        return Vec::new();
    };
    let n = clauses.len();
    let mut included = vec![false; n];
    included[n - 1] = true;
    let mut relevant: BTreeSet<&OriginId> = last.origins.iter().collect();

    loop {
        let mut changed = false;
        // Backward pass: dependencies point from later clauses to the
        // origins established earlier.
        for i in (0..n - 1).rev() {
            if included[i] {
                continue;
            }
            if clauses[i].origins.iter().any(|o| relevant.contains(o)) {
                included[i] = true;
                relevant.extend(clauses[i].origins.iter());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    clauses
        .iter()
        .zip(included.iter())
        .filter_map(|(c, inc)| if *inc { Some(c) } else { None })
        .collect()
}

/// Encodes `path` into its signature. An empty path condition (or one whose
/// slice is empty) yields the all-zero signature, which is still a valid
/// classifier input.
pub fn encode(path: &PathCondition) -> Signature {
    let mut sig = Signature::empty();
    if path.is_empty() {
        return sig;
    }
    for clause in slice_to_last(path) {
        let general = general_text(clause);
        for seed in HASH_SEEDS {
            let col = bucket(&general, seed, SIGNATURE_COLS as u64) as usize;
            let row = bucket(&clause.text, seed, (SIGNATURE_ROWS - 1) as u64) as usize + 1;
            sig.set(0, col);
            sig.set(row, col);
        }
    }
    sig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::OriginId;

    fn clause(text: &str, origins: &[&str]) -> Clause {
        Clause::new(text, origins.iter().map(|o| OriginId::from(*o)))
    }

    #[test]
    fn empty_path_encodes_to_zero() {
        let sig = encode(&PathCondition::default());
        assert!(sig.is_empty());
        assert_eq!(sig, Signature::empty());
    }

    #[test]
    fn encoding_is_deterministic() {
        let p = PathCondition::new(vec![
            clause("x0 > 10", &["x0"]),
            clause("y1 == x0 + 1", &["x0", "y1"]),
            clause("y1 < 100", &["y1"]),
        ]);
        assert_eq!(encode(&p), encode(&p));
    }

    #[test]
    fn slice_keeps_transitive_dependencies() {
        // c depends on b, b depends on a, d is unrelated.
        let a = clause("a0 > 0", &["a0"]);
        let b = clause("b0 == a0", &["a0", "b0"]);
        let d = clause("d0 != 7", &["d0"]);
        let c = clause("b0 < 5", &["b0"]);
        let p = PathCondition::new(vec![a.clone(), b.clone(), d, c.clone()]);
        let sliced: Vec<&Clause> = slice_to_last(&p);
        assert_eq!(sliced, vec![&a, &b, &c]);
    }

    #[test]
    fn slice_of_independent_last_clause_is_singleton() {
        let p = PathCondition::new(vec![
            clause("x > 0", &["x"]),
            clause("y > 0", &["y"]),
            clause("z > 0", &["z"]),
        ]);
        let sliced = slice_to_last(&p);
        assert_eq!(sliced.len(), 1);
        assert_eq!(sliced[0].text, "z > 0");
    }

    #[test]
    fn general_form_collapses_numeric_identifiers() {
        // Same structure, different numeric ids: the general row-0 buckets
        // must coincide.
        let p1 = PathCondition::new(vec![clause("x1 > 0", &["x1"])]);
        let p2 = PathCondition::new(vec![clause("x2 > 0", &["x2"])]);
        let s1 = encode(&p1);
        let s2 = encode(&p2);
        for col in 0..SIGNATURE_COLS {
            assert_eq!(s1.bit(0, col), s2.bit(0, col));
        }
        // But the full signatures differ in the refinement rows.
        assert_ne!(s1, s2);
    }

    #[test]
    fn row_zero_and_one_refinement_row_per_seed() {
        let p = PathCondition::new(vec![clause("x > 1", &["x"])]);
        let sig = encode(&p);
        // Row 0 has at most 3 bits (one per seed, collisions allowed), and
        // at least one.
        let row0: u32 = (0..SIGNATURE_COLS).filter(|c| sig.bit(0, *c)).count() as u32;
        assert!((1..=3).contains(&row0));
        // Each seed also sets exactly one refinement bit in rows 1..=15.
        let refinement: u32 = sig.popcount() - row0;
        assert!((1..=3).contains(&refinement));
    }

    #[test]
    fn similarity_bounds_and_identity() {
        let p = PathCondition::new(vec![clause("x > 1", &["x"]), clause("x < 9", &["x"])]);
        let q = PathCondition::new(vec![clause("k == 4", &["k"])]);
        let sp = encode(&p);
        let sq = encode(&q);
        assert_eq!(sp.similarity(&sp), 1.0);
        let s = sp.similarity(&sq);
        assert!((0.0..=1.0).contains(&s));
        assert_eq!(sp.similarity(&sq), sq.similarity(&sp));
    }

    #[test]
    fn zero_signatures_have_zero_similarity() {
        let z = Signature::empty();
        assert_eq!(z.similarity(&z), 0.0);
    }
}
