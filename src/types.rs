//src/types.rs

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sequence::NucleotideSequence;

/// Which strand of the source a candidate (or an index hit) was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Half-open, 0-based interval into the source, always in forward-strand
/// orientation. Covers the spacer only; the PAM sits immediately after `end`
/// on the forward strand and immediately before `start` on the reverse strand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locus {
    pub sequence_id: Arc<str>,
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
}

impl Locus {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}({})", self.sequence_id, self.start, self.end, self.strand)
    }
}

/// One cut-site candidate. Never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuideCandidate {
    /// The spacer, 5' to 3' on `locus.strand`.
    pub sequence: NucleotideSequence,
    /// Literal PAM bases as read on `locus.strand`.
    pub pam: NucleotideSequence,
    pub locus: Locus,
}

impl GuideCandidate {
    pub fn id(&self) -> CandidateId {
        CandidateId {
            sequence: self.sequence.clone(),
            locus: self.locus.clone(),
        }
    }

    /// Spacer + PAM, the window searched for off-targets.
    pub fn full_sequence(&self) -> NucleotideSequence {
        self.sequence.concat(&self.pam)
    }

    pub fn gc_fraction(&self) -> f64 {
        self.sequence.gc_fraction()
    }

    /// Forward-strand footprint of spacer + PAM.
    pub fn window(&self) -> std::ops::Range<usize> {
        match self.locus.strand {
            Strand::Forward => self.locus.start..self.locus.end + self.pam.len(),
            Strand::Reverse => self.locus.start.saturating_sub(self.pam.len())..self.locus.end,
        }
    }
}

/// Identity of a candidate: spacer plus locus. Companion records are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId {
    pub sequence: NucleotideSequence,
    pub locus: Locus,
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.sequence, self.locus)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyAnnotation {
    pub candidate_id: CandidateId,
    /// In `[0, 100]`.
    pub score: f64,
}

/// Near-match counts for one candidate, indexed by mismatch count `0..=k`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffTargetProfile {
    pub candidate_id: CandidateId,
    pub counts: Vec<u32>,
}

impl OffTargetProfile {
    pub fn new(candidate_id: CandidateId, max_mismatches: usize) -> Self {
        Self {
            candidate_id,
            counts: vec![0; max_mismatches + 1],
        }
    }

    /// Occurrences at exactly `mismatches`; 0 beyond the searched range.
    pub fn count(&self, mismatches: usize) -> u32 {
        self.counts.get(mismatches).copied().unwrap_or(0)
    }

    pub fn max_mismatches(&self) -> usize {
        self.counts.len().saturating_sub(1)
    }

    pub fn total_hits(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Weighted off-target burden: `sum_{m>=1} counts[m] / (m + 1)`.
    /// The 0-mismatch bucket is the intended target and carries no weight.
    pub fn burden(&self) -> f64 {
        self.counts
            .iter()
            .enumerate()
            .skip(1)
            .map(|(m, &c)| c as f64 / (m as f64 + 1.0))
            .sum()
    }
}

/// A selected guide with its annotations and dense 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedGuide {
    pub candidate: GuideCandidate,
    pub score: f64,
    pub off_target_profile: OffTargetProfile,
    pub rank: usize,
    /// Off-target specificity in `[0, 100]`, higher is better.
    pub specificity: f64,
    /// `0.6 * score + 0.4 * specificity`, two decimals. Informational only.
    pub composite: f64,
}
