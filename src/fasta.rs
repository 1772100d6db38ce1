use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::FastaError;
use crate::region::strip_chr;
use crate::sequence::NucleotideSequence;

/// One FASTA entry. `id` is the first word of the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub header_line: String,
    pub sequence: NucleotideSequence,
}

/// Reads every record of a FASTA file, transparently handling `.gz`.
pub fn read_fasta_records<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>, FastaError> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };

    let records = parse_fasta(reader)?;
    log::info!("Read {} FASTA record(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Parses FASTA text from any buffered reader.
///
/// Soft-masked (lower-case) bases are upper-cased and IUPAC ambiguity codes
/// become `N`. Blank lines and `;` comment lines are ignored.
pub fn parse_fasta<R: BufRead>(mut reader: R) -> Result<Vec<FastaRecord>, FastaError> {
    let mut records = Vec::new();
    let mut header: Option<String> = None;
    let mut bases: Vec<u8> = Vec::new();
    let mut line = String::new();
    let mut line_no = 0;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }
        if let Some(h) = trimmed.strip_prefix('>') {
            if let Some(prev) = header.take() {
                records.push(finish_record(prev, &bases)?);
            }
            bases.clear();
            header = Some(h.trim().to_string());
            continue;
        }
        if header.is_none() {
            return Err(FastaError::MissingHeader(line_no));
        }
        bases.extend(trimmed.bytes().filter(|b| !b.is_ascii_whitespace()).map(normalize_base));
    }

    if let Some(prev) = header.take() {
        records.push(finish_record(prev, &bases)?);
    }
    if records.is_empty() {
        return Err(FastaError::NoRecords);
    }
    Ok(records)
}

/// Finds a record by id, ignoring a `chr` prefix on either side.
pub fn find_record<'a>(records: &'a [FastaRecord], name: &str) -> Option<&'a FastaRecord> {
    let wanted = strip_chr(name);
    records
        .iter()
        .find(|r| r.id == name)
        .or_else(|| records.iter().find(|r| strip_chr(&r.id).eq_ignore_ascii_case(wanted)))
}

/// Concatenates all records into one sequence, separating neighbours with
/// `gap` `N`s. A window that spans a junction then covers the whole gap, so
/// with `gap > max_mismatches` no hit can straddle two records.
pub fn join_records(records: &[FastaRecord], gap: usize) -> Option<NucleotideSequence> {
    let total: usize = records.iter().map(|r| r.sequence.len() + gap).sum();
    let mut bases = Vec::with_capacity(total);
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            bases.resize(bases.len() + gap, b'N');
        }
        bases.extend_from_slice(record.sequence.as_bytes());
    }
    NucleotideSequence::from_bytes(&bases).ok()
}

fn normalize_base(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        u @ (b'A' | b'C' | b'G' | b'T' | b'N') => u,
        b'R' | b'Y' | b'S' | b'W' | b'K' | b'M' | b'B' | b'D' | b'H' | b'V' | b'U' => b'N',
        _ => b,
    }
}

fn finish_record(header_line: String, bases: &[u8]) -> Result<FastaRecord, FastaError> {
    let id = header_line
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    let sequence = NucleotideSequence::from_bytes(bases).map_err(|source| FastaError::Sequence {
        id: id.clone(),
        source,
    })?;
    Ok(FastaRecord {
        id,
        header_line,
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SequenceError;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const TWO_RECORDS: &str = ">chr1 test contig\nACGTacgt\nNNRY\n\n>chr2\n; comment\nGGCC\n";

    #[test]
    fn test_parse_records() {
        let records = parse_fasta(TWO_RECORDS.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "chr1");
        assert_eq!(records[0].header_line, "chr1 test contig");
        assert_eq!(records[0].sequence.as_str(), "ACGTACGTNNNN");
        assert_eq!(records[1].id, "chr2");
        assert_eq!(records[1].sequence.as_str(), "GGCC");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_fasta("ACGT\n".as_bytes()), Err(FastaError::MissingHeader(1))));
        assert!(matches!(parse_fasta("".as_bytes()), Err(FastaError::NoRecords)));
        assert!(matches!(
            parse_fasta(">a\nAC-GT\n".as_bytes()),
            Err(FastaError::Sequence { source: SequenceError::InvalidSymbol { symbol: '-', offset: 2 }, .. })
        ));
        assert!(matches!(
            parse_fasta(">empty\n>b\nAC\n".as_bytes()),
            Err(FastaError::Sequence { source: SequenceError::Empty, .. })
        ));
    }

    #[test]
    fn test_read_plain_and_gzip_files() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("ref.fa");
        std::fs::write(&plain, TWO_RECORDS).unwrap();
        let from_plain = read_fasta_records(&plain).unwrap();

        let gz = dir.path().join("ref.fa.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(TWO_RECORDS.as_bytes()).unwrap();
        encoder.finish().unwrap();
        let from_gz = read_fasta_records(&gz).unwrap();

        assert_eq!(from_plain, from_gz);
        assert!(matches!(
            read_fasta_records(dir.path().join("missing.fa")),
            Err(FastaError::Io(_))
        ));
    }

    #[test]
    fn test_find_record() {
        let records = parse_fasta(TWO_RECORDS.as_bytes()).unwrap();
        assert_eq!(find_record(&records, "chr2").map(|r| r.id.as_str()), Some("chr2"));
        assert_eq!(find_record(&records, "1").map(|r| r.id.as_str()), Some("chr1"));
        assert!(find_record(&records, "chr3").is_none());
    }

    #[test]
    fn test_join_records() {
        let records = parse_fasta(TWO_RECORDS.as_bytes()).unwrap();
        let joined = join_records(&records, 4).unwrap();
        assert_eq!(joined.as_str(), "ACGTACGTNNNNNNNNGGCC");
        assert_eq!(join_records(&records[1..], 4).unwrap().as_str(), "GGCC");
        assert_eq!(join_records(&records, 0).unwrap().as_str(), "ACGTACGTNNNNGGCC");
        assert!(join_records(&[], 4).is_none());
    }
}
