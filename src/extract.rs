//src/extract.rs

use std::sync::Arc;

use crate::config::DesignConfig;
use crate::error::ConfigError;
use crate::filters::GuideFilter;
use crate::sequence::{complement, reverse_complement_bytes, NucleotideSequence};
use crate::types::{GuideCandidate, Locus, Strand};

/// Bit mask of the concrete bases an IUPAC symbol stands for (A=1, C=2, G=4, T=8).
#[inline]
fn iupac_mask(symbol: u8) -> Option<u8> {
    let mask = match symbol {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' => 0b1000,
        b'R' => 0b0101,
        b'Y' => 0b1010,
        b'S' => 0b0110,
        b'W' => 0b1001,
        b'K' => 0b1100,
        b'M' => 0b0011,
        b'B' => 0b1110,
        b'D' => 0b1101,
        b'H' => 0b1011,
        b'V' => 0b0111,
        b'N' => 0b1111,
        _ => return None,
    };
    Some(mask)
}

#[inline]
fn base_mask(base: u8) -> u8 {
    match base {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' => 0b1000,
        _ => 0,
    }
}

/// A compiled PAM motif. `N` in the pattern matches anything, including a
/// source `N`; other symbols only match the concrete bases they denote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PamPattern {
    symbols: Vec<u8>,
    masks: Vec<u8>,
}

impl PamPattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::EmptyPam);
        }
        let symbols: Vec<u8> = pattern.bytes().map(|b| b.to_ascii_uppercase()).collect();
        let masks = symbols
            .iter()
            .map(|&s| iupac_mask(s).ok_or(ConfigError::InvalidPamSymbol(s as char)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { symbols, masks })
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.symbols).unwrap_or("")
    }

    /// Does the base at pattern offset `i` satisfy the pattern?
    #[inline]
    fn accepts(&self, i: usize, base: u8) -> bool {
        let mask = self.masks[i];
        mask == 0b1111 || mask & base_mask(base) != 0
    }

    /// Match against `window`, which must be exactly `len()` bases long.
    pub fn matches(&self, window: &[u8]) -> bool {
        window.len() == self.len()
            && window.iter().enumerate().all(|(i, &b)| self.accepts(i, b))
    }

    /// Match against the reverse complement of `window` without allocating.
    fn matches_reverse(&self, window: &[u8]) -> bool {
        window.len() == self.len()
            && window
                .iter()
                .rev()
                .enumerate()
                .all(|(i, &b)| self.accepts(i, complement(b)))
    }
}

/// Scans a source sequence on both strands for PAM sites and yields the
/// quality-filtered spacers adjacent to them.
#[derive(Debug, Clone)]
pub struct GuideExtractor {
    pam: PamPattern,
    guide_length: usize,
    filter: GuideFilter,
}

impl GuideExtractor {
    pub fn new(pam: PamPattern, guide_length: usize, filter: GuideFilter) -> Self {
        Self {
            pam,
            guide_length,
            filter,
        }
    }

    pub fn from_config(config: &DesignConfig) -> Result<Self, ConfigError> {
        let pam = config.validate()?;
        Ok(Self::new(pam, config.guide_length, GuideFilter::from_config(config)))
    }

    pub fn pam(&self) -> &PamPattern {
        &self.pam
    }

    pub fn guide_length(&self) -> usize {
        self.guide_length
    }

    /// Lazily yields candidates ordered by forward-strand start offset, forward
    /// strand first on ties. Calling again restarts the scan. Sources shorter
    /// than one guide + PAM window yield nothing.
    pub fn extract<'a>(&'a self, sequence_id: &str, source: &'a NucleotideSequence) -> Candidates<'a> {
        Candidates {
            extractor: self,
            sequence_id: Arc::from(sequence_id),
            source: source.as_bytes(),
            pos: 0,
            reverse_next: false,
        }
    }

    /// Forward candidate whose spacer starts at `x`.
    fn forward_at(&self, id: &Arc<str>, source: &[u8], x: usize) -> Option<GuideCandidate> {
        let g = self.guide_length;
        let p = self.pam.len();
        if x + g + p > source.len() {
            return None;
        }
        let pam = &source[x + g..x + g + p];
        if !self.pam.matches(pam) {
            return None;
        }
        let spacer = &source[x..x + g];
        self.build(id, spacer.to_vec(), pam.to_vec(), x, Strand::Forward)
    }

    /// Reverse candidate whose spacer footprint starts at `x` on the forward
    /// strand; its PAM footprint is `[x - p, x)`.
    fn reverse_at(&self, id: &Arc<str>, source: &[u8], x: usize) -> Option<GuideCandidate> {
        let g = self.guide_length;
        let p = self.pam.len();
        if x < p || x + g > source.len() {
            return None;
        }
        let pam_fwd = &source[x - p..x];
        if !self.pam.matches_reverse(pam_fwd) {
            return None;
        }
        let spacer = reverse_complement_bytes(&source[x..x + g]);
        let pam = reverse_complement_bytes(pam_fwd);
        self.build(id, spacer, pam, x, Strand::Reverse)
    }

    fn build(
        &self,
        id: &Arc<str>,
        spacer: Vec<u8>,
        pam: Vec<u8>,
        start: usize,
        strand: Strand,
    ) -> Option<GuideCandidate> {
        if spacer.contains(&b'N') || !self.filter.passes(&spacer) {
            return None;
        }
        Some(GuideCandidate {
            sequence: NucleotideSequence::from_bytes(&spacer).ok()?,
            pam: NucleotideSequence::from_bytes(&pam).ok()?,
            locus: Locus {
                sequence_id: Arc::clone(id),
                start,
                end: start + self.guide_length,
                strand,
            },
        })
    }
}

/// Iterator returned by [`GuideExtractor::extract`].
#[derive(Clone)]
pub struct Candidates<'a> {
    extractor: &'a GuideExtractor,
    sequence_id: Arc<str>,
    source: &'a [u8],
    pos: usize,
    reverse_next: bool,
}

impl Iterator for Candidates<'_> {
    type Item = GuideCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        let g = self.extractor.guide_length;
        while self.pos + g <= self.source.len() {
            let x = self.pos;
            let found = if self.reverse_next {
                self.reverse_next = false;
                self.pos += 1;
                self.extractor.reverse_at(&self.sequence_id, self.source, x)
            } else {
                self.reverse_next = true;
                self.extractor.forward_at(&self.sequence_id, self.source, x)
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

/// Collects every candidate from `source` using the options in `config`.
pub fn extract_guides(
    sequence_id: &str,
    source: &NucleotideSequence,
    config: &DesignConfig,
) -> Result<Vec<GuideCandidate>, ConfigError> {
    let extractor = GuideExtractor::from_config(config)?;
    let guides: Vec<GuideCandidate> = extractor.extract(sequence_id, source).collect();
    Ok(guides)
}
