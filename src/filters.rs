//src/filters.rs

use crate::config::DesignConfig;

/// (G + C) / length. Returns 0.0 for an empty slice.
pub fn gc_fraction(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gc = seq
        .iter()
        .filter(|&&b| matches!(b, b'G' | b'C' | b'g' | b'c'))
        .count();
    gc as f64 / seq.len() as f64
}

/// True if any single symbol repeats `min_run` or more times in a row.
/// Sequences shorter than `min_run` never qualify.
pub fn has_homopolymer(seq: &[u8], min_run: usize) -> bool {
    if min_run == 0 || seq.len() < min_run {
        return false;
    }
    let mut run = 1;
    for pair in seq.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
            if run >= min_run {
                return true;
            }
        } else {
            run = 1;
        }
    }
    min_run == 1
}

/// Plain substring containment.
pub fn has_motif(seq: &[u8], motif: &[u8]) -> bool {
    if motif.is_empty() {
        return true;
    }
    seq.windows(motif.len()).any(|w| w == motif)
}

/// The quality filters applied to every spacer before a candidate is emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideFilter {
    pub gc_min: f64,
    pub gc_max: f64,
    pub homopolymer_run: usize,
    pub forbidden_motifs: Vec<Vec<u8>>,
}

impl Default for GuideFilter {
    fn default() -> Self {
        Self {
            gc_min: 0.4,
            gc_max: 0.6,
            homopolymer_run: 4,
            forbidden_motifs: vec![b"TTTT".to_vec()],
        }
    }
}

impl GuideFilter {
    pub fn from_config(config: &DesignConfig) -> Self {
        Self {
            gc_min: config.gc_range.0,
            gc_max: config.gc_range.1,
            homopolymer_run: config.homopolymer_run,
            forbidden_motifs: config
                .forbidden_motifs
                .iter()
                .map(|m| m.to_ascii_uppercase().into_bytes())
                .collect(),
        }
    }

    /// A filter that accepts every spacer.
    pub fn permissive() -> Self {
        Self {
            gc_min: 0.0,
            gc_max: 1.0,
            homopolymer_run: usize::MAX,
            forbidden_motifs: Vec::new(),
        }
    }

    pub fn passes(&self, spacer: &[u8]) -> bool {
        let gc = gc_fraction(spacer);
        if gc < self.gc_min || gc > self.gc_max {
            return false;
        }
        if has_homopolymer(spacer, self.homopolymer_run) {
            return false;
        }
        !self
            .forbidden_motifs
            .iter()
            .any(|motif| has_motif(spacer, motif))
    }
}
