//src/scoring.rs

use crate::error::ScoreError;
use crate::filters::{gc_fraction, has_motif};
use crate::sequence::{reverse_complement_bytes, NucleotideSequence};
use crate::types::{EfficiencyAnnotation, GuideCandidate, Strand};

/// Local sequence around a guide, read 5' to 3' on the guide's strand.
///
/// The nominal window is `upstream` bases 5' of the spacer, the spacer, the
/// PAM, then `downstream` bases 3' of the PAM. At the ends of the source the
/// window is clipped, so `sequence` may be shorter than nominal;
/// `guide_offset` always points at the first spacer base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlankingContext {
    pub sequence: NucleotideSequence,
    pub guide_offset: usize,
    pub window_len: usize,
}

impl FlankingContext {
    pub fn for_candidate(
        source: &NucleotideSequence,
        candidate: &GuideCandidate,
        upstream: usize,
        downstream: usize,
    ) -> Option<Self> {
        let bytes = source.as_bytes();
        let window = candidate.window();
        if window.end > bytes.len() {
            return None;
        }
        let window_len = window.end - window.start;
        let (oriented, guide_offset) = match candidate.locus.strand {
            Strand::Forward => {
                let lo = window.start.saturating_sub(upstream);
                let hi = (window.end + downstream).min(bytes.len());
                (bytes[lo..hi].to_vec(), window.start - lo)
            }
            Strand::Reverse => {
                // 5' of a reverse-strand spacer lies after it on the forward strand.
                let lo = window.start.saturating_sub(downstream);
                let hi = (window.end + upstream).min(bytes.len());
                (reverse_complement_bytes(&bytes[lo..hi]), hi - window.end)
            }
        };
        Some(Self {
            sequence: NucleotideSequence::from_bytes(&oriented).ok()?,
            guide_offset,
            window_len,
        })
    }

    /// Context bases outside the spacer + PAM window.
    pub fn flanks(&self) -> impl Iterator<Item = u8> + '_ {
        let start = self.guide_offset;
        let end = self.guide_offset + self.window_len;
        self.sequence
            .as_bytes()
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i < start || *i >= end)
            .map(|(_, &b)| b)
    }
}

/// A pluggable on-target efficiency model.
///
/// Implementations must be pure: identical inputs give bit-identical output
/// and no state is carried between calls.
pub trait EfficiencyScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Nominal `(upstream, downstream)` flank widths this scorer expects.
    fn flank_widths(&self) -> (usize, usize);

    /// Score in `[0, 100]`.
    fn score(&self, guide: &GuideCandidate, context: &FlankingContext) -> Result<f64, ScoreError>;
}

/// Builds the context `scorer` asks for and scores `candidate`.
pub fn annotate(
    scorer: &dyn EfficiencyScorer,
    source: &NucleotideSequence,
    candidate: &GuideCandidate,
) -> Result<EfficiencyAnnotation, ScoreError> {
    let (up, down) = scorer.flank_widths();
    let context = FlankingContext::for_candidate(source, candidate, up, down).ok_or_else(|| {
        let window = candidate.window();
        ScoreError::ContextOutOfBounds {
            start: window.start,
            end: window.end,
            len: source.len(),
        }
    })?;
    let score = scorer.score(candidate, &context)?;
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(ScoreError::OutOfRange(score));
    }
    Ok(EfficiencyAnnotation {
        candidate_id: candidate.id(),
        score,
    })
}

/// Rule-based scorer over composition and position preferences.
///
/// Nominal context is 4 nt upstream + spacer + PAM + 3 nt downstream (30 nt
/// for the default geometry). Starting from 50:
/// - spacer GC: `10 - d` when the deviation `d` from 50% is at most 10
///   points, otherwise `-(d - 10) / 2`
/// - last spacer base G: +4, second-to-last G: +2, first base C: +1
/// - 5' twelve bases: GC in `[0.4, 0.6]` +3 else -2; a `TTT` costs -5
/// - 3' eight bases: GC >= 0.5 +2 else -1
/// - per base, runs of 3 / 4 / 5: -2 / -5 / -10 (cumulative)
/// - flanks: GC of the available flank bases in `[0.4, 0.6]` +1, else -1.
///   Clipped flank positions are simply absent from the fraction; with no
///   flank bases at all the term is 0.
///
/// The result is clamped to `[0, 100]` and rounded to one decimal.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub const UPSTREAM: usize = 4;
    pub const DOWNSTREAM: usize = 3;

    fn gc_term(spacer: &[u8]) -> f64 {
        let deviation = (gc_fraction(spacer) * 100.0 - 50.0).abs();
        if deviation <= 10.0 {
            10.0 - deviation
        } else {
            -(deviation - 10.0) * 0.5
        }
    }

    fn position_term(spacer: &[u8]) -> f64 {
        let mut score = 0.0;
        let n = spacer.len();
        if n >= 2 && spacer[n - 2] == b'G' {
            score += 2.0;
        }
        if spacer[n - 1] == b'G' {
            score += 4.0;
        }
        if spacer[0] == b'C' {
            score += 1.0;
        }
        score
    }

    fn five_prime_term(spacer: &[u8]) -> f64 {
        let head = &spacer[..spacer.len().min(12)];
        let mut score = if (0.4..=0.6).contains(&gc_fraction(head)) { 3.0 } else { -2.0 };
        if has_motif(head, b"TTT") {
            score -= 5.0;
        }
        score
    }

    fn three_prime_term(spacer: &[u8]) -> f64 {
        let tail = &spacer[spacer.len().saturating_sub(8)..];
        if gc_fraction(tail) >= 0.5 {
            2.0
        } else {
            -1.0
        }
    }

    fn homopolymer_term(spacer: &[u8]) -> f64 {
        let mut penalty = 0.0;
        for base in [b'A', b'T', b'G', b'C'] {
            for (run, cost) in [(3usize, 2.0), (4, 5.0), (5, 10.0)] {
                if spacer.windows(run).any(|w| w.iter().all(|&b| b == base)) {
                    penalty -= cost;
                }
            }
        }
        penalty
    }

    fn flank_term(context: &FlankingContext) -> f64 {
        let (mut gc, mut total) = (0usize, 0usize);
        for b in context.flanks() {
            match b {
                b'G' | b'C' => {
                    gc += 1;
                    total += 1;
                }
                b'A' | b'T' => total += 1,
                _ => {}
            }
        }
        if total == 0 {
            return 0.0;
        }
        let frac = gc as f64 / total as f64;
        if (0.4..=0.6).contains(&frac) {
            1.0
        } else {
            -1.0
        }
    }
}

impl EfficiencyScorer for HeuristicScorer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn flank_widths(&self) -> (usize, usize) {
        (Self::UPSTREAM, Self::DOWNSTREAM)
    }

    fn score(&self, guide: &GuideCandidate, context: &FlankingContext) -> Result<f64, ScoreError> {
        let spacer = guide.sequence.as_bytes();
        if spacer.is_empty() {
            return Err(ScoreError::GuideTooShort(0));
        }
        let raw = 50.0
            + Self::gc_term(spacer)
            + Self::position_term(spacer)
            + Self::five_prime_term(spacer)
            + Self::three_prime_term(spacer)
            + Self::homopolymer_term(spacer)
            + Self::flank_term(context);
        let clamped = raw.clamp(0.0, 100.0);
        Ok((clamped * 10.0).round() / 10.0)
    }
}
