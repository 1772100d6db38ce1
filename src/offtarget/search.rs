// src/offtarget/search.rs

use crate::error::{QueryError, SearchError};
use crate::refindex::{IndexHit, ReferenceIndex};
use crate::types::{GuideCandidate, OffTargetProfile};

/// Counts near-matches of each candidate's spacer + PAM window.
///
/// The mismatch budget is shared by spacer and PAM positions. A candidate
/// extracted from the searched reference always sees its own site as a
/// 0-mismatch hit; that hit is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffTargetSearcher {
    max_mismatches: usize,
}

impl OffTargetSearcher {
    pub fn new(max_mismatches: usize) -> Self {
        Self { max_mismatches }
    }

    pub fn max_mismatches(&self) -> usize {
        self.max_mismatches
    }

    pub fn profile(
        &self,
        candidate: &GuideCandidate,
        index: &ReferenceIndex,
    ) -> Result<OffTargetProfile, SearchError> {
        profile(candidate, index, self.max_mismatches)
    }
}

/// Buckets every index hit for `sequence + pam` by mismatch count.
pub fn profile(
    candidate: &GuideCandidate,
    index: &ReferenceIndex,
    max_mismatches: usize,
) -> Result<OffTargetProfile, SearchError> {
    let window = candidate.full_sequence();
    if max_mismatches >= window.len() {
        return Err(SearchError::Query(QueryError::TooManyMismatches {
            max_mismatches,
            pattern_len: window.len(),
        }));
    }
    let hits = index.query(&window, max_mismatches)?;
    Ok(bucket_hits(candidate, &hits, max_mismatches))
}

fn bucket_hits(candidate: &GuideCandidate, hits: &[IndexHit], max_mismatches: usize) -> OffTargetProfile {
    let mut profile = OffTargetProfile::new(candidate.id(), max_mismatches);
    for hit in hits {
        if let Some(slot) = profile.counts.get_mut(hit.mismatches) {
            *slot += 1;
        }
    }
    profile
}
