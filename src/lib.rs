// src/lib.rs
pub mod cancel;
pub mod config;
pub mod error;
pub mod extract;
pub mod fasta;
pub mod filters;
pub mod offtarget;
pub mod pipeline;
pub mod rank;
pub mod refindex;
pub mod region;
pub mod scoring;
pub mod sequence;
pub mod types;

use std::path::Path;

pub use crate::cancel::CancellationToken;
pub use crate::config::{DesignConfig, SpecificityFilter};
pub use crate::error::PipelineError;
pub use crate::pipeline::{CandidateFailure, DesignReport, FailureStage, Pipeline, ReferenceInput};
pub use crate::refindex::ReferenceIndex;
pub use crate::region::GenomicRegion;
pub use crate::sequence::NucleotideSequence;
pub use crate::types::{GuideCandidate, Locus, OffTargetProfile, RankedGuide, Strand};

use crate::fasta::{find_record, join_records, read_fasta_records};

/// Designs guides for `target`, searching off-targets in `reference` or, when
/// `None`, in the target itself.
pub fn design_guides(
    sequence_id: &str,
    target: &NucleotideSequence,
    reference: Option<&NucleotideSequence>,
    config: DesignConfig,
) -> Result<DesignReport, PipelineError> {
    let pipeline = Pipeline::new(config)?;
    let reference = match reference {
        Some(seq) => ReferenceInput::Sequence(seq),
        None => ReferenceInput::Target,
    };
    pipeline.run(sequence_id, target, reference)
}

/// File-based entry point used by the binary.
///
/// The target is the first record of `target_path`, or the slice described by
/// `region` taken from the matching record. All reference records are joined
/// into one searchable sequence. `on_profiled` is called once per candidate
/// whose off-target search finished.
pub fn design_guides_from_files(
    target_path: &Path,
    reference_path: Option<&Path>,
    region: Option<&GenomicRegion>,
    config: DesignConfig,
    on_profiled: &(dyn Fn() + Sync),
) -> Result<DesignReport, Box<dyn std::error::Error>> {
    // 1. Validate before touching any large file
    let pipeline = Pipeline::new(config)?;

    // 2. Target
    let target_records = read_fasta_records(target_path)?;
    let (sequence_id, target) = match region {
        Some(region) => {
            let record = find_record(&target_records, region.chromosome())
                .ok_or_else(|| format!("no record for {} in {}", region.chromosome(), target_path.display()))?;
            (region.to_string(), region.slice(&record.sequence)?)
        }
        None => {
            let record = target_records
                .first()
                .ok_or_else(|| format!("no records in {}", target_path.display()))?;
            (record.id.clone(), record.sequence.clone())
        }
    };

    // 3. Reference
    let gap = pipeline.config().max_mismatches + 1;
    let reference = match reference_path {
        Some(path) => {
            let records = read_fasta_records(path)?;
            Some(join_records(&records, gap).ok_or_else(|| format!("no records in {}", path.display()))?)
        }
        None => None,
    };

    // 4. Design
    let input = match &reference {
        Some(seq) => ReferenceInput::Sequence(seq),
        None => ReferenceInput::Target,
    };
    let cancel = CancellationToken::new();
    Ok(pipeline.run_observed(&sequence_id, &target, input, &cancel, on_profiled)?)
}
