//src/pipeline.rs

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::config::DesignConfig;
use crate::error::{PipelineError, SearchError};
use crate::extract::GuideExtractor;
use crate::offtarget::profile_candidates_observed;
use crate::rank::{passes_specificity_filter, rank};
use crate::refindex::ReferenceIndex;
use crate::scoring::{annotate, EfficiencyScorer, HeuristicScorer};
use crate::sequence::NucleotideSequence;
use crate::types::{CandidateId, EfficiencyAnnotation, GuideCandidate, OffTargetProfile, RankedGuide};

/// Where off-targets are searched.
#[derive(Clone)]
pub enum ReferenceInput<'a> {
    /// Search the target itself (region-only checking).
    Target,
    /// Build a fresh index over this sequence for the request.
    Sequence(&'a NucleotideSequence),
    /// An already built, read-only index owned by the caller.
    Index(Arc<ReferenceIndex>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Scoring,
    OffTargetSearch,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Scoring => f.write_str("scoring"),
            FailureStage::OffTargetSearch => f.write_str("off-target search"),
        }
    }
}

/// A candidate dropped because one of its annotations could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateFailure {
    pub candidate: CandidateId,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of one design request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignReport {
    pub guides: Vec<RankedGuide>,
    pub candidates_extracted: usize,
    /// Candidates with both a score and a complete off-target profile.
    pub candidates_annotated: usize,
    pub filtered_by_specificity: usize,
    pub failures: Vec<CandidateFailure>,
}

impl DesignReport {
    pub const TSV_HEADER: &'static str =
        "rank\tsequence_id\tstart\tend\tstrand\tspacer\tpam\tgc\tefficiency\tspecificity\tcomposite\toff_targets";

    /// Ranked guides as tab-separated text, one line per guide after a header.
    /// `off_targets` lists the hit counts for 0, 1, .. k mismatches.
    pub fn guides_tsv(&self) -> String {
        let mut output = String::from(Self::TSV_HEADER);
        output.push('\n');
        for guide in &self.guides {
            let c = &guide.candidate;
            let counts: Vec<String> = guide
                .off_target_profile
                .counts
                .iter()
                .map(|n| n.to_string())
                .collect();
            output.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.1}\t{:.1}\t{:.2}\t{}\n",
                guide.rank,
                c.locus.sequence_id,
                c.locus.start,
                c.locus.end,
                c.locus.strand,
                c.sequence,
                c.pam,
                c.gc_fraction(),
                guide.score,
                guide.specificity,
                guide.composite,
                counts.join(",")
            ));
        }
        output
    }

    fn empty() -> Self {
        Self {
            guides: Vec::new(),
            candidates_extracted: 0,
            candidates_annotated: 0,
            filtered_by_specificity: 0,
            failures: Vec::new(),
        }
    }
}

/// Extraction, scoring, off-target search and ranking for one configuration.
pub struct Pipeline {
    config: DesignConfig,
    extractor: GuideExtractor,
    scorer: Box<dyn EfficiencyScorer>,
}

impl Pipeline {
    /// Validates `config`; uses [`HeuristicScorer`].
    pub fn new(config: DesignConfig) -> Result<Self, PipelineError> {
        Self::with_scorer(config, Box::new(HeuristicScorer))
    }

    pub fn with_scorer(
        config: DesignConfig,
        scorer: Box<dyn EfficiencyScorer>,
    ) -> Result<Self, PipelineError> {
        let extractor = GuideExtractor::from_config(&config)?;
        Ok(Self {
            config,
            extractor,
            scorer,
        })
    }

    pub fn config(&self) -> &DesignConfig {
        &self.config
    }

    pub fn extractor(&self) -> &GuideExtractor {
        &self.extractor
    }

    pub fn scorer(&self) -> &dyn EfficiencyScorer {
        self.scorer.as_ref()
    }

    pub fn run(
        &self,
        sequence_id: &str,
        target: &NucleotideSequence,
        reference: ReferenceInput<'_>,
    ) -> Result<DesignReport, PipelineError> {
        self.run_with_cancel(sequence_id, target, reference, &CancellationToken::new())
    }

    pub fn run_with_cancel(
        &self,
        sequence_id: &str,
        target: &NucleotideSequence,
        reference: ReferenceInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<DesignReport, PipelineError> {
        self.run_observed(sequence_id, target, reference, cancel, &|| {})
    }

    /// Runs every stage. Either returns a ranked list in which every guide
    /// carries a complete off-target profile, or fails as a whole.
    /// `on_profiled` fires once per finished off-target search.
    pub fn run_observed(
        &self,
        sequence_id: &str,
        target: &NucleotideSequence,
        reference: ReferenceInput<'_>,
        cancel: &CancellationToken,
        on_profiled: &(dyn Fn() + Sync),
    ) -> Result<DesignReport, PipelineError> {
        // 1. Candidates
        let candidates: Vec<GuideCandidate> = self.extractor.extract(sequence_id, target).collect();
        log::info!(
            "Extracted {} candidate guides from {} ({} bases)",
            candidates.len(),
            sequence_id,
            target.len()
        );
        if candidates.is_empty() {
            return Ok(DesignReport::empty());
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // 2. Efficiency scores
        let scorer = self.scorer.as_ref();
        log::info!("Scoring {} candidates with the {} scorer", candidates.len(), scorer.name());
        let scores: Vec<_> = candidates
            .par_iter()
            .map(|candidate| annotate(scorer, target, candidate))
            .collect();

        // 3. Reference index, published before any query runs
        let index = match reference {
            ReferenceInput::Target => Arc::new(ReferenceIndex::build(target, self.config.seed_length)?),
            ReferenceInput::Sequence(seq) => Arc::new(ReferenceIndex::build(seq, self.config.seed_length)?),
            ReferenceInput::Index(index) => index,
        };
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        // 4. Off-target profiles
        log::info!(
            "Searching off-targets with up to {} mismatches in {} reference bases ({} seeds)",
            self.config.max_mismatches,
            index.reference_len(),
            index.num_seeds()
        );
        let profiles = profile_candidates_observed(
            &index,
            &candidates,
            self.config.max_mismatches,
            cancel,
            on_profiled,
        );
        if cancel.is_cancelled() || profiles.iter().any(|p| matches!(p, Err(SearchError::Cancelled))) {
            return Err(PipelineError::Cancelled);
        }

        // 5. Keep only fully annotated candidates
        let mut kept_candidates = Vec::with_capacity(candidates.len());
        let mut kept_scores: Vec<EfficiencyAnnotation> = Vec::with_capacity(candidates.len());
        let mut kept_profiles: Vec<OffTargetProfile> = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();
        let mut filtered_by_specificity = 0;

        for ((candidate, score), profile) in candidates.into_iter().zip(scores).zip(profiles) {
            let score = match score {
                Ok(s) => s,
                Err(e) => {
                    failures.push(failure(&candidate, FailureStage::Scoring, e.to_string()));
                    continue;
                }
            };
            let profile = match profile {
                Ok(p) => p,
                Err(e) => {
                    failures.push(failure(&candidate, FailureStage::OffTargetSearch, e.to_string()));
                    continue;
                }
            };
            if let Some(filter) = &self.config.specificity_filter {
                if !passes_specificity_filter(&profile, filter) {
                    filtered_by_specificity += 1;
                    continue;
                }
            }
            kept_candidates.push(candidate);
            kept_scores.push(score);
            kept_profiles.push(profile);
        }

        for f in &failures {
            log::warn!("Dropped candidate {} during {}: {}", f.candidate, f.stage, f.message);
        }
        let candidates_extracted = kept_candidates.len() + failures.len() + filtered_by_specificity;
        log::info!(
            "Annotated {} of {} candidates ({} failed, {} over the specificity limits)",
            kept_candidates.len(),
            candidates_extracted,
            failures.len(),
            filtered_by_specificity
        );

        // 6. Ranking
        let guides = rank(&kept_candidates, &kept_scores, &kept_profiles, self.config.top_n)?;
        log::info!("Selected {} guides", guides.len());

        Ok(DesignReport {
            guides,
            candidates_extracted,
            candidates_annotated: kept_candidates.len(),
            filtered_by_specificity,
            failures,
        })
    }
}

fn failure(candidate: &GuideCandidate, stage: FailureStage, message: String) -> CandidateFailure {
    CandidateFailure {
        candidate: candidate.id(),
        stage,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpecificityFilter;
    use crate::error::{ConfigError, ScoreError};
    use crate::scoring::FlankingContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCENARIO: &str = "ATATATATATGGAAGACTCCAGTGGTAATCTGGATATATATAT";

    fn seq(s: &str) -> NucleotideSequence {
        NucleotideSequence::new(s).unwrap()
    }

    #[test]
    fn test_end_to_end_single_guide() {
        let config = DesignConfig { top_n: 1, ..Default::default() };
        let pipeline = Pipeline::new(config).unwrap();
        let target = seq(SCENARIO);
        let report = pipeline.run("chr1", &target, ReferenceInput::Target).unwrap();
        assert_eq!(report.candidates_extracted, 1);
        assert_eq!(report.guides.len(), 1);
        let guide = &report.guides[0];
        assert_eq!(guide.rank, 1);
        assert_eq!(guide.candidate.sequence.as_str(), "GGAAGACTCCAGTGGTAATC");
        assert_eq!(guide.candidate.pam.as_str(), "TGG");
        assert_eq!(guide.candidate.locus.start, 10);
        assert_eq!(guide.off_target_profile.count(0), 1);
        assert!(report.failures.is_empty());

        let tsv = report.guides_tsv();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], DesignReport::TSV_HEADER);
        assert!(lines[1].starts_with("1\tchr1\t10\t30\t+\tGGAAGACTCCAGTGGTAATC\tTGG\t"));
        assert!(lines[1].ends_with("\t1,0,0,0"));
    }

    #[test]
    fn test_prebuilt_index_is_reused() {
        let pipeline = Pipeline::new(DesignConfig::default()).unwrap();
        let genome = seq(&format!("{}{}{}", "AC".repeat(50), SCENARIO, "GT".repeat(50)));
        let index = Arc::new(ReferenceIndex::build(&genome, 12).unwrap());
        let target = seq(SCENARIO);
        let a = pipeline.run("t", &target, ReferenceInput::Index(Arc::clone(&index))).unwrap();
        let b = pipeline.run("t", &target, ReferenceInput::Sequence(&genome)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.guides[0].off_target_profile.counts, vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_short_target_gives_empty_result() {
        let pipeline = Pipeline::new(DesignConfig::default()).unwrap();
        let report = pipeline.run("t", &seq("GGAAGACTCCAGTGGTAATCTG"), ReferenceInput::Target).unwrap();
        assert!(report.guides.is_empty());
        assert_eq!(report.candidates_extracted, 0);
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let config = DesignConfig { max_mismatches: 30, ..Default::default() };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::Config(ConfigError::TooManyMismatches { .. }))
        ));
    }

    #[test]
    fn test_cancellation() {
        let pipeline = Pipeline::new(DesignConfig::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = pipeline.run_with_cancel("t", &seq(SCENARIO), ReferenceInput::Target, &token);
        assert_eq!(result, Err(PipelineError::Cancelled));
    }

    fn synthetic(len: usize, mut state: u64) -> String {
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                b"ACGT"[(state >> 33) as usize % 4] as char
            })
            .collect()
    }

    #[test]
    fn test_cancellation_during_off_target_search() {
        let pipeline = Pipeline::new(DesignConfig::default()).unwrap();
        let target = seq(&synthetic(4_000, 11));
        let token = CancellationToken::new();
        let done = AtomicUsize::new(0);
        let result = pipeline.run_observed("t", &target, ReferenceInput::Target, &token, &|| {
            if done.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                token.cancel();
            }
        });
        assert_eq!(result, Err(PipelineError::Cancelled));
        assert!(done.load(Ordering::SeqCst) >= 3);

        // the same pipeline still completes when left alone
        let report = pipeline.run("t", &target, ReferenceInput::Target).unwrap();
        assert!(report.candidates_extracted > 3);
        assert_eq!(report.guides.len(), 5);
    }

    #[test]
    fn test_specificity_filter_drops_repetitive_guides() {
        // two 1-mismatch copies of the intended site
        let one_mm = "GGAAGACTCCAGTGGTAATATGG";
        let target = seq(&format!("{SCENARIO}{one_mm}ATATAT{one_mm}"));
        let strict = DesignConfig {
            specificity_filter: Some(SpecificityFilter { max_one_mismatch: 1, max_two_mismatch: 10 }),
            ..Default::default()
        };
        let report = Pipeline::new(strict).unwrap().run("t", &target, ReferenceInput::Target).unwrap();
        assert!(report
            .guides
            .iter()
            .all(|g| g.candidate.sequence.as_str() != "GGAAGACTCCAGTGGTAATC"));
        assert!(report.filtered_by_specificity >= 1);
    }

    struct RejectAll;

    impl EfficiencyScorer for RejectAll {
        fn name(&self) -> &str {
            "reject-all"
        }
        fn flank_widths(&self) -> (usize, usize) {
            (0, 0)
        }
        fn score(&self, guide: &GuideCandidate, _: &FlankingContext) -> Result<f64, ScoreError> {
            Err(ScoreError::GuideTooShort(guide.sequence.len()))
        }
    }

    #[test]
    fn test_scoring_failures_are_reported_not_ranked() {
        let pipeline = Pipeline::with_scorer(DesignConfig::default(), Box::new(RejectAll)).unwrap();
        let report = pipeline.run("t", &seq(SCENARIO), ReferenceInput::Target).unwrap();
        assert!(report.guides.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, FailureStage::Scoring);
    }
}
