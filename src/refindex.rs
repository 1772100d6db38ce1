//src/refindex.rs

use std::ops::Range;

use ahash::AHashSet;

use crate::error::{IndexError, QueryError};
use crate::sequence::{encode_base_2bit, reverse_complement_bytes, NucleotideSequence, INVALID_BASE};
use crate::types::Strand;

/// Longest seed that fits a 32-bit key.
pub const MAX_SEED_LENGTH: usize = 16;

/// Seed length used when none is configured.
pub const DEFAULT_SEED_LENGTH: usize = 12;

/// Upper bound on the number of leading nucleotides used for bin keys.
pub const MAX_BIN_NT: usize = 8;

/// One reference position in the seed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeedEntry {
    /// 2-bit packed bases starting at `pos`, most significant first. Bases
    /// after an `N` or past the reference end are packed as zero.
    key: u32,
    pos: u32,
    /// Number of leading real (non-N, in-bounds) bases in `key`.
    valid: u8,
}

/// A near-match reported by [`ReferenceIndex::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexHit {
    /// Forward-strand offset of the leftmost aligned base.
    pub position: usize,
    pub mismatches: usize,
    /// `Reverse` when the reverse complement of the pattern matched.
    pub strand: Strand,
}

/// Read-only seed index over one reference sequence.
///
/// Every reference offset is keyed by its first `seed_len` bases. Entries
/// are grouped into bins by their leading `bin_nt` bases (an offset table of
/// `4^bin_nt + 1` entries) and sorted by key inside each bin, so any key
/// prefix resolves to one contiguous slice via the bin table plus a binary
/// search.
///
/// Queries with at most `k` substitutions split the pattern into `k + 1`
/// segments; a true hit matches at least one segment exactly, so seed hits
/// for the segments give a complete candidate set, which is then verified
/// base by base. Build is linear in the reference (counting sort into bins,
/// then small per-bin sorts). Positions are 32-bit.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    reference: Vec<u8>,
    seed_len: usize,
    bin_nt: usize,
    entries: Vec<SeedEntry>,
    bin_offsets: Vec<u32>,
    /// Sorted offsets of `N` bases; only consulted for segments containing `N`.
    n_positions: Vec<u32>,
}

impl ReferenceIndex {
    /// Index that answers every query with zero matches.
    pub fn empty() -> Self {
        Self {
            reference: Vec::new(),
            seed_len: DEFAULT_SEED_LENGTH,
            bin_nt: DEFAULT_SEED_LENGTH.min(MAX_BIN_NT),
            entries: Vec::new(),
            bin_offsets: Vec::new(),
            n_positions: Vec::new(),
        }
    }

    pub fn build(reference: &NucleotideSequence, seed_len: usize) -> Result<Self, IndexError> {
        let reference = reference.as_bytes();
        if seed_len == 0 || seed_len > MAX_SEED_LENGTH {
            return Err(IndexError::InvalidSeedLength(seed_len));
        }
        if reference.len() > u32::MAX as usize {
            return Err(IndexError::ReferenceTooLarge(reference.len()));
        }
        let bin_nt = seed_len.min(MAX_BIN_NT);
        let bin_shift = 2 * (seed_len - bin_nt);
        let top_shift = 2 * (seed_len - 1);

        // Keys are rolled right to left so each one is truncated at the first N.
        let n = reference.len();
        let mut keys = vec![0u32; n];
        let mut valid = vec![0u8; n];
        let mut n_positions = Vec::new();
        let (mut key, mut run) = (0u64, 0usize);
        for x in (0..n).rev() {
            let code = encode_base_2bit(reference[x]);
            if code == INVALID_BASE {
                key = 0;
                run = 0;
                n_positions.push(x as u32);
            } else {
                key = (code << top_shift) | (key >> 2);
                run = (run + 1).min(seed_len);
            }
            keys[x] = key as u32;
            valid[x] = run as u8;
        }
        n_positions.reverse();

        // Counting sort into bins, then sort each bin by (key, pos).
        let num_bins = 1usize << (2 * bin_nt);
        let mut bin_offsets = vec![0u32; num_bins + 1];
        for x in 0..n {
            if valid[x] > 0 {
                bin_offsets[(keys[x] >> bin_shift) as usize + 1] += 1;
            }
        }
        for b in 0..num_bins {
            bin_offsets[b + 1] += bin_offsets[b];
        }
        let total = bin_offsets[num_bins] as usize;
        let mut fill: Vec<u32> = bin_offsets[..num_bins].to_vec();
        let mut entries = vec![SeedEntry { key: 0, pos: 0, valid: 0 }; total];
        for x in 0..n {
            if valid[x] == 0 {
                continue;
            }
            let bin = (keys[x] >> bin_shift) as usize;
            entries[fill[bin] as usize] = SeedEntry {
                key: keys[x],
                pos: x as u32,
                valid: valid[x],
            };
            fill[bin] += 1;
        }
        if bin_shift > 0 {
            for b in 0..num_bins {
                let range = bin_offsets[b] as usize..bin_offsets[b + 1] as usize;
                entries[range].sort_unstable_by_key(|e| (e.key, e.pos));
            }
        }

        log::info!(
            "Built reference index over {} bases, seed_len={}, bin_nt={}, seeds={}, N={}",
            n,
            seed_len,
            bin_nt,
            entries.len(),
            n_positions.len()
        );

        Ok(Self {
            reference: reference.to_vec(),
            seed_len,
            bin_nt,
            entries,
            bin_offsets,
            n_positions,
        })
    }

    pub fn reference_len(&self) -> usize {
        self.reference.len()
    }

    pub fn seed_length(&self) -> usize {
        self.seed_len
    }

    pub fn num_seeds(&self) -> usize {
        self.entries.len()
    }

    /// Every alignment of `pattern` (or its reverse complement) with at most
    /// `max_mismatches` substitutions, sorted by `(position, strand)`.
    ///
    /// Positions compare by plain equality, so `N` only matches `N`.
    pub fn query(
        &self,
        pattern: &NucleotideSequence,
        max_mismatches: usize,
    ) -> Result<Vec<IndexHit>, QueryError> {
        let pat = pattern.as_bytes();
        if pat.is_empty() {
            return Err(QueryError::EmptyPattern);
        }
        if max_mismatches >= pat.len() {
            return Err(QueryError::TooManyMismatches {
                max_mismatches,
                pattern_len: pat.len(),
            });
        }
        if pat.len() > self.reference.len() {
            return Ok(Vec::new());
        }

        let mut hits = self.search_strand(pat, max_mismatches, Strand::Forward);
        let rc = reverse_complement_bytes(pat);
        hits.extend(self.search_strand(&rc, max_mismatches, Strand::Reverse));
        hits.sort_unstable_by_key(|h| (h.position, h.strand));
        Ok(hits)
    }

    /// Seed-and-verify for one orientation of the pattern.
    fn search_strand(&self, pat: &[u8], k: usize, strand: Strand) -> Vec<IndexHit> {
        let len = pat.len();
        let last_start = self.reference.len() - len;
        let mut candidates: AHashSet<usize> = AHashSet::new();

        for segment in pigeonhole_segments(len, k + 1) {
            let offset = segment.start;
            let bases = &pat[segment];
            if let Some(j) = bases.iter().position(|&b| encode_base_2bit(b) == INVALID_BASE) {
                // An exact segment hit needs a reference N exactly here.
                let shift = offset + j;
                for &q in &self.n_positions {
                    let q = q as usize;
                    if q >= shift && q - shift <= last_start {
                        candidates.insert(q - shift);
                    }
                }
                continue;
            }
            let prefix_len = bases.len().min(self.seed_len);
            for entry in self.seed_range(&bases[..prefix_len]) {
                let pos = entry.pos as usize;
                if (entry.valid as usize) < prefix_len || pos < offset {
                    continue;
                }
                let start = pos - offset;
                if start <= last_start {
                    candidates.insert(start);
                }
            }
        }

        let mut hits: Vec<IndexHit> = candidates
            .into_iter()
            .filter_map(|p| {
                count_mismatches(pat, &self.reference[p..p + len], k).map(|mismatches| IndexHit {
                    position: p,
                    mismatches,
                    strand,
                })
            })
            .collect();
        hits.sort_unstable();
        hits
    }

    /// All seed entries whose key starts with `prefix` (ACGT only,
    /// `1..=seed_len` bases).
    fn seed_range(&self, prefix: &[u8]) -> &[SeedEntry] {
        let mut code = 0u64;
        for &b in prefix {
            code = (code << 2) | encode_base_2bit(b);
        }
        let free_bits = 2 * (self.seed_len - prefix.len());
        let lower = code << free_bits;
        let upper = (code + 1) << free_bits; // exclusive

        let bin_shift = 2 * (self.seed_len - self.bin_nt);
        let bin_lo = (lower >> bin_shift) as usize;
        let bin_hi = ((upper - 1) >> bin_shift) as usize;
        let Some(slice) = self.bin_range(bin_lo..bin_hi + 1) else {
            return &[];
        };

        let first = slice.partition_point(|e| (e.key as u64) < lower);
        let last = slice.partition_point(|e| (e.key as u64) < upper);
        &slice[first..last]
    }

    /// Entries in bins `[bins.start, bins.end)`.
    fn bin_range(&self, bins: Range<usize>) -> Option<&[SeedEntry]> {
        let start = *self.bin_offsets.get(bins.start)? as usize;
        let end = *self.bin_offsets.get(bins.end)? as usize;
        self.entries.get(start..end)
    }
}

/// Splits `len` into `parts` contiguous, near-equal ranges (earlier ones longer).
fn pigeonhole_segments(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let extra = len % parts;
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let seg = base + usize::from(i < extra);
        out.push(start..start + seg);
        start += seg;
    }
    out
}

/// Substitutions between `a` and `b`, or `None` once more than `limit`.
#[inline]
fn count_mismatches(a: &[u8], b: &[u8], limit: usize) -> Option<usize> {
    let mut mismatches = 0;
    for (x, y) in a.iter().zip(b) {
        if x != y {
            mismatches += 1;
            if mismatches > limit {
                return None;
            }
        }
    }
    Some(mismatches)
}
