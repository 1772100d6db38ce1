//src/error.rs

use thiserror::Error;

/// Problems constructing a `NucleotideSequence`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("sequence must contain at least one symbol")]
    Empty,
    #[error("invalid nucleotide '{symbol}' at offset {offset}")]
    InvalidSymbol { symbol: char, offset: usize },
}

/// Invalid design parameters. Always fatal, raised before any stage runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("PAM pattern must not be empty")]
    EmptyPam,
    #[error("invalid PAM symbol '{0}'")]
    InvalidPamSymbol(char),
    #[error("guide length must be at least 1")]
    ZeroGuideLength,
    #[error("max_mismatches ({max_mismatches}) must be smaller than the search window ({window})")]
    TooManyMismatches { max_mismatches: usize, window: usize },
    #[error("top_n must be at least 1")]
    ZeroTopN,
    #[error("GC range ({0}, {1}) must satisfy 0 <= min <= max <= 1")]
    InvalidGcRange(f64, f64),
    #[error("homopolymer run must be at least 2, got {0}")]
    InvalidHomopolymerRun(usize),
    #[error("forbidden motif '{0}' is not a valid nucleotide string")]
    InvalidMotif(String),
    #[error("seed length must be in 1..=16, got {0}")]
    InvalidSeedLength(usize),
    #[error("could not read configuration: {0}")]
    Io(String),
    #[error("could not parse configuration: {0}")]
    Parse(String),
}

/// Failures building a `ReferenceIndex`. Fatal to the whole request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("reference of {0} bases exceeds the 32-bit position limit")]
    ReferenceTooLarge(usize),
    #[error("seed length must be in 1..=16, got {0}")]
    InvalidSeedLength(usize),
}

/// Rejected index queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("query pattern must not be empty")]
    EmptyPattern,
    #[error("max_mismatches ({max_mismatches}) must be smaller than the pattern length ({pattern_len})")]
    TooManyMismatches { max_mismatches: usize, pattern_len: usize },
}

/// A scorer could not produce a valid score for one candidate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error("score {0} is outside [0, 100]")]
    OutOfRange(f64),
    #[error("guide of length {0} is too short for this scorer")]
    GuideTooShort(usize),
    #[error("guide window {start}..{end} lies outside a source of {len} bases")]
    ContextOutOfBounds { start: usize, end: usize, len: usize },
}

/// Off-target search failure for one candidate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("search cancelled")]
    Cancelled,
}

/// Malformed `chr:start-end` strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error("invalid region format '{0}', expected 'chr:start-end'")]
    Format(String),
    #[error("start coordinate must be >= 1, got {0}")]
    StartBelowOne(u64),
    #[error("end coordinate ({end}) must be >= start coordinate ({start})")]
    EndBeforeStart { start: u64, end: u64 },
    #[error("region too large: {0} bp (maximum is {max} bp)", max = crate::region::MAX_REGION_SPAN)]
    TooLarge(u64),
    #[error("region {region} lies outside a sequence of {len} bases")]
    OutOfBounds { region: String, len: usize },
}

/// Errors reading FASTA input.
#[derive(Debug, Error)]
pub enum FastaError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("sequence data before the first '>' header at line {0}")]
    MissingHeader(usize),
    #[error("record '{id}': {source}")]
    Sequence {
        id: String,
        #[source]
        source: SequenceError,
    },
    #[error("no records found")]
    NoRecords,
}

/// Request-level failures of the design pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("index build failed: {0}")]
    Index(#[from] IndexError),
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),
    #[error("design cancelled")]
    Cancelled,
}
