//src/config.rs

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::extract::PamPattern;
use crate::refindex::MAX_SEED_LENGTH;
use crate::sequence::NucleotideSequence;

/// Optional post-search filter on off-target counts. Guides with more
/// 1-mismatch or 2-mismatch sites than allowed are dropped before ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificityFilter {
    pub max_one_mismatch: u32,
    pub max_two_mismatch: u32,
}

impl Default for SpecificityFilter {
    fn default() -> Self {
        Self {
            max_one_mismatch: 5,
            max_two_mismatch: 10,
        }
    }
}

/// Every recognised design option. Missing JSON fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    /// PAM motif, IUPAC wildcards allowed (e.g. `NGG`, `NNGRRT`).
    pub pam_pattern: String,
    /// Spacer length in nucleotides.
    pub guide_length: usize,
    /// Largest mismatch count reported by the off-target search.
    pub max_mismatches: usize,
    pub top_n: usize,
    /// Inclusive GC fraction bounds for spacers.
    pub gc_range: (f64, f64),
    /// Spacers with a single-base run of at least this length are rejected.
    pub homopolymer_run: usize,
    pub forbidden_motifs: Vec<String>,
    /// Seed length of the reference index, `1..=16`.
    pub seed_length: usize,
    pub specificity_filter: Option<SpecificityFilter>,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            pam_pattern: "NGG".to_string(),
            guide_length: 20,
            max_mismatches: 3,
            top_n: 5,
            gc_range: (0.4, 0.6),
            homopolymer_run: 4,
            forbidden_motifs: vec!["TTTT".to_string()],
            seed_length: 12,
            specificity_filter: None,
        }
    }
}

impl DesignConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&text)
    }

    /// Length of the spacer + PAM window searched against the reference.
    pub fn window_length(&self) -> usize {
        self.guide_length + self.pam_pattern.len()
    }

    /// Checks every option; returns the compiled PAM pattern on success.
    pub fn validate(&self) -> Result<PamPattern, ConfigError> {
        let pam = PamPattern::parse(&self.pam_pattern)?;
        if self.guide_length == 0 {
            return Err(ConfigError::ZeroGuideLength);
        }
        let window = self.guide_length + pam.len();
        if self.max_mismatches >= window {
            return Err(ConfigError::TooManyMismatches {
                max_mismatches: self.max_mismatches,
                window,
            });
        }
        if self.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        let (lo, hi) = self.gc_range;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(ConfigError::InvalidGcRange(lo, hi));
        }
        if self.homopolymer_run < 2 {
            return Err(ConfigError::InvalidHomopolymerRun(self.homopolymer_run));
        }
        for motif in &self.forbidden_motifs {
            if NucleotideSequence::new(motif).is_err() {
                return Err(ConfigError::InvalidMotif(motif.clone()));
            }
        }
        if self.seed_length == 0 || self.seed_length > MAX_SEED_LENGTH {
            return Err(ConfigError::InvalidSeedLength(self.seed_length));
        }
        Ok(pam)
    }
}
