//src/rank.rs

use std::cmp::Ordering;

use ahash::AHashMap;

use crate::config::SpecificityFilter;
use crate::error::ConfigError;
use crate::types::{CandidateId, EfficiencyAnnotation, GuideCandidate, OffTargetProfile, RankedGuide};

/// Penalty per site for mismatch tiers 1, 2 and 3. Higher tiers are free.
const SPECIFICITY_PENALTIES: [f64; 3] = [20.0, 5.0, 1.0];
/// Penalty per extra perfect match beyond the intended site.
const EXTRA_PERFECT_MATCH_PENALTY: f64 = 100.0;

const EFFICIENCY_WEIGHT: f64 = 0.6;
const SPECIFICITY_WEIGHT: f64 = 0.4;

/// Specificity in `[0, 100]`, higher is better.
pub fn specificity_score(profile: &OffTargetProfile) -> f64 {
    let mut score = 100.0;
    let perfect = profile.count(0);
    if perfect > 1 {
        score -= (perfect - 1) as f64 * EXTRA_PERFECT_MATCH_PENALTY;
    }
    for (tier, penalty) in SPECIFICITY_PENALTIES.iter().enumerate() {
        score -= profile.count(tier + 1) as f64 * penalty;
    }
    score.clamp(0.0, 100.0)
}

/// Weighted blend of efficiency and specificity, two decimals.
pub fn composite_score(efficiency: f64, specificity: f64) -> f64 {
    let composite = efficiency * EFFICIENCY_WEIGHT + specificity * SPECIFICITY_WEIGHT;
    (composite * 100.0).round() / 100.0
}

pub fn passes_specificity_filter(profile: &OffTargetProfile, filter: &SpecificityFilter) -> bool {
    profile.count(1) <= filter.max_one_mismatch && profile.count(2) <= filter.max_two_mismatch
}

struct Entry<'a> {
    candidate: &'a GuideCandidate,
    score: f64,
    burden: f64,
    profile: &'a OffTargetProfile,
}

/// Total order: score desc, off-target burden asc, start asc, then strand,
/// spacer and sequence id so that no two distinct candidates compare equal.
fn compare(a: &Entry, b: &Entry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.burden.total_cmp(&b.burden))
        .then_with(|| a.candidate.locus.start.cmp(&b.candidate.locus.start))
        .then_with(|| a.candidate.locus.strand.cmp(&b.candidate.locus.strand))
        .then_with(|| a.candidate.sequence.cmp(&b.candidate.sequence))
        .then_with(|| a.candidate.locus.sequence_id.cmp(&b.candidate.locus.sequence_id))
}

/// Orders fully annotated candidates and returns the best `top_n` with dense
/// 1-based ranks. A candidate lacking a score or a profile is not ranked.
pub fn rank(
    candidates: &[GuideCandidate],
    scores: &[EfficiencyAnnotation],
    profiles: &[OffTargetProfile],
    top_n: usize,
) -> Result<Vec<RankedGuide>, ConfigError> {
    if top_n == 0 {
        return Err(ConfigError::ZeroTopN);
    }
    let score_by_id: AHashMap<&CandidateId, f64> =
        scores.iter().map(|s| (&s.candidate_id, s.score)).collect();
    let profile_by_id: AHashMap<&CandidateId, &OffTargetProfile> =
        profiles.iter().map(|p| (&p.candidate_id, p)).collect();

    let mut entries: Vec<Entry> = candidates
        .iter()
        .filter_map(|candidate| {
            let id = candidate.id();
            let score = *score_by_id.get(&id)?;
            let profile = *profile_by_id.get(&id)?;
            Some(Entry {
                candidate,
                score,
                burden: profile.burden(),
                profile,
            })
        })
        .collect();

    entries.sort_by(compare);

    Ok(entries
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, e)| {
            let specificity = specificity_score(e.profile);
            RankedGuide {
                candidate: e.candidate.clone(),
                score: e.score,
                off_target_profile: e.profile.clone(),
                rank: i + 1,
                specificity,
                composite: composite_score(e.score, specificity),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::NucleotideSequence;
    use crate::types::{Locus, Strand};
    use std::sync::Arc;

    fn guide(spacer: &str, start: usize, strand: Strand) -> GuideCandidate {
        GuideCandidate {
            sequence: NucleotideSequence::new(spacer).unwrap(),
            pam: NucleotideSequence::new("AGG").unwrap(),
            locus: Locus {
                sequence_id: Arc::from("chr1"),
                start,
                end: start + spacer.len(),
                strand,
            },
        }
    }

    fn annotations(
        specs: &[(&GuideCandidate, f64, Vec<u32>)],
    ) -> (Vec<EfficiencyAnnotation>, Vec<OffTargetProfile>) {
        let scores = specs
            .iter()
            .map(|(g, s, _)| EfficiencyAnnotation { candidate_id: g.id(), score: *s })
            .collect();
        let profiles = specs
            .iter()
            .map(|(g, _, counts)| OffTargetProfile { candidate_id: g.id(), counts: counts.clone() })
            .collect();
        (scores, profiles)
    }

    #[test]
    fn test_score_is_primary_key() {
        let a = guide("ACGTACGTACGTACGTACGT", 10, Strand::Forward);
        let b = guide("TGCATGCATGCATGCATGCA", 50, Strand::Forward);
        let (scores, profiles) = annotations(&[(&a, 60.0, vec![1, 9, 9, 9]), (&b, 70.0, vec![1, 0, 0, 0])]);
        let ranked = rank(&[a.clone(), b.clone()], &scores, &profiles, 5).unwrap();
        assert_eq!(ranked[0].candidate, b);
        assert_eq!(ranked[1].candidate, a);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_lower_burden_wins_on_equal_score() {
        let a = guide("ACGTACGTACGTACGTACGT", 10, Strand::Forward);
        let b = guide("TGCATGCATGCATGCATGCA", 50, Strand::Forward);
        // burden a = 2/2 = 1.0; burden b = 3/4 = 0.75
        let (scores, profiles) = annotations(&[(&a, 60.0, vec![1, 2, 0, 0]), (&b, 60.0, vec![1, 0, 0, 3])]);
        let ranked = rank(&[a.clone(), b.clone()], &scores, &profiles, 5).unwrap();
        assert_eq!(ranked[0].candidate, b);
        // 0-mismatch hits carry no burden
        let (scores, profiles) = annotations(&[(&a, 60.0, vec![9, 0, 0, 0]), (&b, 60.0, vec![1, 0, 0, 1])]);
        let ranked = rank(&[a.clone(), b.clone()], &scores, &profiles, 5).unwrap();
        assert_eq!(ranked[0].candidate, a);
    }

    #[test]
    fn test_start_then_strand_break_ties() {
        let a = guide("ACGTACGTACGTACGTACGT", 30, Strand::Forward);
        let b = guide("TGCATGCATGCATGCATGCA", 20, Strand::Reverse);
        let c = guide("GGCATGCATGCATGCATGCA", 20, Strand::Forward);
        let counts = vec![1, 0, 1, 0];
        let (scores, profiles) = annotations(&[
            (&a, 55.0, counts.clone()),
            (&b, 55.0, counts.clone()),
            (&c, 55.0, counts),
        ]);
        let ranked = rank(&[a.clone(), b.clone(), c.clone()], &scores, &profiles, 3).unwrap();
        let order: Vec<_> = ranked.into_iter().map(|r| r.candidate).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn test_rank_is_idempotent_and_truncates() {
        let guides: Vec<_> = (0..10)
            .map(|i| guide("ACGTACGTACGTACGTACGT", i * 7, Strand::Forward))
            .collect();
        let specs: Vec<_> = guides
            .iter()
            .enumerate()
            .map(|(i, g)| (g, 50.0 + (i % 3) as f64, vec![1, (i % 2) as u32, 0, 0]))
            .collect();
        let (scores, profiles) = annotations(&specs);
        let first = rank(&guides, &scores, &profiles, 4).unwrap();
        let second = rank(&guides, &scores, &profiles, 4).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(first.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        let all = rank(&guides, &scores, &profiles, 100).unwrap();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_unannotated_candidates_are_not_ranked() {
        let a = guide("ACGTACGTACGTACGTACGT", 10, Strand::Forward);
        let b = guide("TGCATGCATGCATGCATGCA", 50, Strand::Forward);
        let (scores, mut profiles) = annotations(&[(&a, 60.0, vec![1, 0, 0, 0]), (&b, 90.0, vec![1, 0, 0, 0])]);
        profiles.retain(|p| p.candidate_id != b.id());
        let ranked = rank(&[a.clone(), b], &scores, &profiles, 5).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate, a);
    }

    #[test]
    fn test_zero_top_n_is_rejected() {
        assert_eq!(rank(&[], &[], &[], 0), Err(ConfigError::ZeroTopN));
        assert!(rank(&[], &[], &[], 1).unwrap().is_empty());
    }

    #[test]
    fn test_specificity_and_composite() {
        let a = guide("ACGTACGTACGTACGTACGT", 10, Strand::Forward);
        let clean = OffTargetProfile { candidate_id: a.id(), counts: vec![1, 0, 0, 0] };
        assert_eq!(specificity_score(&clean), 100.0);
        let noisy = OffTargetProfile { candidate_id: a.id(), counts: vec![1, 2, 3, 4] };
        // 100 - 40 - 15 - 4
        assert_eq!(specificity_score(&noisy), 41.0);
        let repeated = OffTargetProfile { candidate_id: a.id(), counts: vec![3, 0, 0, 0] };
        assert_eq!(specificity_score(&repeated), 0.0);
        assert_eq!(composite_score(62.0, 41.0), 53.6);

        let filter = SpecificityFilter::default();
        assert!(passes_specificity_filter(&noisy, &filter));
        let crowded = OffTargetProfile { candidate_id: a.id(), counts: vec![1, 6, 0, 0] };
        assert!(!passes_specificity_filter(&crowded, &filter));
    }
}
