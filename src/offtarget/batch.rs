use rayon::prelude::*;

use super::profile;
use crate::cancel::CancellationToken;
use crate::error::SearchError;
use crate::refindex::ReferenceIndex;
use crate::types::{GuideCandidate, OffTargetProfile};

/// Per-candidate results of a batch, in input order. Each entry is either a
/// complete profile or the reason that candidate has none.
pub type BatchOutcome = Vec<Result<OffTargetProfile, SearchError>>;

type Partial = Vec<(usize, Result<OffTargetProfile, SearchError>)>;

/// Parallel off-target profiling of many candidates against one shared index.
///
/// Workers only read the index and the candidate slice. Cancellation is
/// checked before each candidate: candidates not yet started report
/// `SearchError::Cancelled`, finished profiles are returned intact.
pub fn profile_candidates_parallel(
    index: &ReferenceIndex,
    candidates: &[GuideCandidate],
    max_mismatches: usize,
    cancel: &CancellationToken,
) -> BatchOutcome {
    profile_candidates_observed(index, candidates, max_mismatches, cancel, &|| {})
}

/// Like [`profile_candidates_parallel`], calling `on_profiled` from the worker
/// thread each time a candidate's search completes.
pub fn profile_candidates_observed(
    index: &ReferenceIndex,
    candidates: &[GuideCandidate],
    max_mismatches: usize,
    cancel: &CancellationToken,
    on_profiled: &(dyn Fn() + Sync),
) -> BatchOutcome {
    let mut results = candidates
        .par_iter()
        .enumerate()
        .fold(
            || Vec::with_capacity(64),
            |mut acc: Partial, (i, candidate)| {
                let result = if cancel.is_cancelled() {
                    Err(SearchError::Cancelled)
                } else {
                    let result = profile(candidate, index, max_mismatches);
                    on_profiled();
                    result
                };
                acc.push((i, result));
                acc
            },
        )
        .reduce(|| Vec::with_capacity(64), merge_partial_results);

    results.sort_unstable_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, r)| r).collect()
}

/// Merges two partial outcomes from different threads.
fn merge_partial_results(mut a: Partial, mut b: Partial) -> Partial {
    a.append(&mut b);
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesignConfig;
    use crate::extract::GuideExtractor;
    use crate::sequence::NucleotideSequence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn synthetic(len: usize, mut state: u64) -> String {
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                b"ACGT"[(state >> 33) as usize % 4] as char
            })
            .collect()
    }

    fn setup() -> (ReferenceIndex, Vec<GuideCandidate>) {
        let reference = NucleotideSequence::new(&synthetic(4_000, 11)).unwrap();
        let extractor = GuideExtractor::from_config(&DesignConfig::default()).unwrap();
        let candidates: Vec<_> = extractor.extract("ref", &reference).collect();
        (ReferenceIndex::build(&reference, 12).unwrap(), candidates)
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (index, candidates) = setup();
        assert!(!candidates.is_empty());
        let outcome = profile_candidates_parallel(&index, &candidates, 3, &CancellationToken::new());
        assert_eq!(outcome.len(), candidates.len());
        for (candidate, result) in candidates.iter().zip(&outcome) {
            let expected = profile(candidate, &index, 3).unwrap();
            assert_eq!(result.as_ref().unwrap(), &expected);
            // every candidate was extracted from this reference
            assert!(expected.count(0) >= 1);
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let (index, candidates) = setup();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = profile_candidates_parallel(&index, &candidates, 3, &token);
        assert_eq!(outcome.len(), candidates.len());
        assert!(outcome.iter().all(|r| matches!(r, Err(SearchError::Cancelled))));
    }

    #[test]
    fn test_cancel_midway_keeps_finished_profiles() {
        let (index, candidates) = setup();
        assert!(candidates.len() > 20);
        let token = CancellationToken::new();
        let done = AtomicUsize::new(0);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let outcome = pool.install(|| {
            profile_candidates_observed(&index, &candidates, 3, &token, &|| {
                if done.fetch_add(1, Ordering::SeqCst) + 1 == 5 {
                    token.cancel();
                }
            })
        });

        assert_eq!(outcome.len(), candidates.len());
        let mut finished = 0;
        let mut cancelled = 0;
        for (candidate, result) in candidates.iter().zip(&outcome) {
            match result {
                Ok(p) => {
                    assert_eq!(p, &profile(candidate, &index, 3).unwrap());
                    finished += 1;
                }
                Err(e) => {
                    assert_eq!(e, &SearchError::Cancelled);
                    cancelled += 1;
                }
            }
        }
        // at most one search per worker was already running when the token flipped
        assert!((5..=6).contains(&finished), "finished = {finished}");
        assert_eq!(finished, done.load(Ordering::SeqCst));
        assert_eq!(finished + cancelled, candidates.len());
    }
}
