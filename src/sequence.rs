//src/sequence.rs

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::SequenceError;

/// Sentinel returned by [`encode_base_2bit`] for anything that is not A/C/G/T.
pub const INVALID_BASE: u64 = 4;

/// 2-bit code for a base: A=0, C=1, G=2, T=3, everything else => `INVALID_BASE`.
#[inline]
pub fn encode_base_2bit(b: u8) -> u64 {
    match b {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => INVALID_BASE,
    }
}

/// Watson-Crick complement; `N` (and anything unknown) maps to `N`.
#[inline]
pub fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => b'N',
    }
}

/// Reverse complement of a raw upper-case byte slice.
pub fn reverse_complement_bytes(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// An immutable, non-empty nucleotide string over `{A, C, G, T, N}`.
///
/// Lower-case input is accepted and stored upper-cased; any other symbol is
/// rejected with its offset.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NucleotideSequence {
    bases: String,
}

impl NucleotideSequence {
    pub fn new(seq: &str) -> Result<Self, SequenceError> {
        Self::from_bytes(seq.as_bytes())
    }

    pub fn from_bytes(seq: &[u8]) -> Result<Self, SequenceError> {
        if seq.is_empty() {
            return Err(SequenceError::Empty);
        }
        let mut bases = String::with_capacity(seq.len());
        for (offset, &b) in seq.iter().enumerate() {
            let upper = b.to_ascii_uppercase();
            match upper {
                b'A' | b'C' | b'G' | b'T' | b'N' => bases.push(upper as char),
                _ => {
                    return Err(SequenceError::InvalidSymbol {
                        symbol: b as char,
                        offset,
                    })
                }
            }
        }
        Ok(Self { bases })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bases.as_bytes()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.bases
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Always `false`; present for API symmetry with slices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn reverse_complement(&self) -> Self {
        let rc = reverse_complement_bytes(self.as_bytes());
        Self {
            bases: rc.into_iter().map(char::from).collect(),
        }
    }

    pub fn concat(&self, other: &Self) -> Self {
        let mut bases = String::with_capacity(self.len() + other.len());
        bases.push_str(&self.bases);
        bases.push_str(&other.bases);
        Self { bases }
    }

    /// Copy of `range`, or `None` if it is empty or out of bounds.
    pub fn subsequence(&self, range: Range<usize>) -> Option<Self> {
        if range.start >= range.end || range.end > self.len() {
            return None;
        }
        Some(Self {
            bases: self.bases[range].to_string(),
        })
    }

    /// Fraction of G/C symbols (N counts towards the length only).
    pub fn gc_fraction(&self) -> f64 {
        crate::filters::gc_fraction(self.as_bytes())
    }
}

impl FromStr for NucleotideSequence {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for NucleotideSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bases)
    }
}

impl fmt::Debug for NucleotideSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NucleotideSequence({})", self.bases)
    }
}

impl AsRef<[u8]> for NucleotideSequence {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl serde::Serialize for NucleotideSequence {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.bases)
    }
}

impl<'de> serde::Deserialize<'de> for NucleotideSequence {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_lowercase_and_n() {
        let seq = NucleotideSequence::new("acgtN").unwrap();
        assert_eq!(seq.as_str(), "ACGTN");
        assert_eq!(seq.len(), 5);
    }

    #[test]
    fn test_rejects_empty_and_foreign_symbols() {
        assert_eq!(NucleotideSequence::new(""), Err(SequenceError::Empty));
        assert_eq!(
            NucleotideSequence::new("ACXT"),
            Err(SequenceError::InvalidSymbol { symbol: 'X', offset: 2 })
        );
    }

    #[test]
    fn test_reverse_complement() {
        let seq = NucleotideSequence::new("AACGTN").unwrap();
        assert_eq!(seq.reverse_complement().as_str(), "NACGTT");
        assert_eq!(seq.reverse_complement().reverse_complement(), seq);
    }

    #[test]
    fn test_subsequence_bounds() {
        let seq = NucleotideSequence::new("ACGTACGT").unwrap();
        assert_eq!(seq.subsequence(2..5).unwrap().as_str(), "GTA");
        assert!(seq.subsequence(6..9).is_none());
        assert!(seq.subsequence(3..3).is_none());
    }

    #[test]
    fn test_encode_base_2bit() {
        assert_eq!(encode_base_2bit(b'A'), 0);
        assert_eq!(encode_base_2bit(b'c'), 1);
        assert_eq!(encode_base_2bit(b'G'), 2);
        assert_eq!(encode_base_2bit(b'T'), 3);
        assert_eq!(encode_base_2bit(b'N'), INVALID_BASE);
    }
}
