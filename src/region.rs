//src/region.rs

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegionError;
use crate::sequence::NucleotideSequence;

/// Widest region accepted for guide design, in bases.
pub const MAX_REGION_SPAN: u64 = 10_000_000;

/// A `chr:start-end` interval, 1-based and inclusive as written by users.
///
/// Always satisfies `1 <= start <= end` and the span limit; it can only be
/// built through [`GenomicRegion::new`] or parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenomicRegion {
    chromosome: String,
    start: u64,
    end: u64,
}

impl GenomicRegion {
    /// Validates the coordinates; adds a `chr` prefix when it is missing.
    pub fn new(chromosome: &str, start: u64, end: u64) -> Result<Self, RegionError> {
        if start < 1 {
            return Err(RegionError::StartBelowOne(start));
        }
        if end < start {
            return Err(RegionError::EndBeforeStart { start, end });
        }
        if end - start > MAX_REGION_SPAN {
            return Err(RegionError::TooLarge(end - start));
        }
        let chromosome = if chromosome.to_ascii_lowercase().starts_with("chr") {
            chromosome.to_string()
        } else {
            format!("chr{chromosome}")
        };
        Ok(Self { chromosome, start, end })
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bases covered.
    pub fn span(&self) -> u64 {
        self.end - self.start + 1
    }

    /// 0-based half-open range of the region.
    pub fn to_range(&self) -> Range<usize> {
        (self.start - 1) as usize..self.end as usize
    }

    /// Cuts the region out of `sequence`, which must hold the whole chromosome.
    pub fn slice(&self, sequence: &NucleotideSequence) -> Result<NucleotideSequence, RegionError> {
        sequence
            .subsequence(self.to_range())
            .ok_or_else(|| RegionError::OutOfBounds {
                region: self.to_string(),
                len: sequence.len(),
            })
    }
}

/// `chr7` -> `7`; other names are returned unchanged.
pub(crate) fn strip_chr(name: &str) -> &str {
    match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") => &name[3..],
        _ => name,
    }
}

fn parse_coordinate(field: &str, original: &str) -> Result<u64, RegionError> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RegionError::Format(original.to_string()));
    }
    field
        .parse::<u64>()
        .map_err(|_| RegionError::Format(original.to_string()))
}

impl FromStr for GenomicRegion {
    type Err = RegionError;

    /// Accepts `chr17:100-200`, `17:100-200` and `chr17:100..200`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let format_err = || RegionError::Format(s.to_string());

        let (chrom, coords) = trimmed.split_once(':').ok_or_else(format_err)?;
        if chrom.is_empty() || !chrom.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(format_err());
        }
        let (start, end) = coords
            .split_once("..")
            .or_else(|| coords.split_once('-'))
            .ok_or_else(format_err)?;
        let start = parse_coordinate(start, s)?;
        let end = parse_coordinate(end, s)?;
        Self::new(chrom, start, end)
    }
}

impl TryFrom<String> for GenomicRegion {
    type Error = RegionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GenomicRegion> for String {
    fn from(region: GenomicRegion) -> Self {
        region.to_string()
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}
