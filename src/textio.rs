//! Pinned textual readers for the hit-stream and annotation-stream CLI subcommands
//! (`SPEC_FULL.md` §10 "CLI"). These are not a BAM or GTF grammar — just enough of a line format to
//! drive the two real entry points (`AssemblerDriver::run`, `AssemblerDriver::run_from_annotation`)
//! for manual and ad hoc runs without needing an external alignment or annotation reader.

use std::str::FromStr;

use bio_types::strand::Strand;
use rust_htslib::bam::record::CigarString;

use crate::annotation::AnnotationRecord;
use crate::errors::{Error, Result};
use crate::hit::Hit;

fn parse_strand(token: &str) -> Result<Strand> {
    match token {
        "+" => Ok(Strand::Forward),
        "-" => Ok(Strand::Reverse),
        "." => Ok(Strand::Unknown),
        other => Err(Error::MalformedExample {
            msg: format!("unrecognized strand token '{}' (expected +, -, or .)", other),
        }),
    }
}

/// Parses one hit per non-blank, non-`#` line: `<id> <ref_id> <pos> <cigar> <strand> <mapq>`, e.g.
/// `r0 0 100 50M100N50M + 60`. The cigar column is a standard SAM cigar string, parsed with
/// `rust_htslib`'s own `CigarString::from_str` (the same parse path the teacher crate uses to read
/// cigar strings out of its test fixtures).
pub fn parse_hit_lines(text: &str) -> Result<Vec<Hit>> {
    let mut hits = Vec::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != 6 {
            return Err(malformed(lineno, "expected 6 columns: id ref_id pos cigar strand mapq"));
        }
        let ref_id: i32 = cols[1]
            .parse()
            .map_err(|_| malformed(lineno, "ref_id must be an integer"))?;
        let pos: i32 = cols[2]
            .parse()
            .map_err(|_| malformed(lineno, "pos must be an integer"))?;
        let cigar = CigarString::from_str(cols[3]).map_err(|e| Error::MalformedCigar { msg: e.to_string() })?;
        let strand = parse_strand(cols[4])?;
        let mapq: u8 = cols[5]
            .parse()
            .map_err(|_| malformed(lineno, "mapq must fit in a u8"))?;
        hits.push(Hit::new(cols[0], ref_id, pos, cigar, strand, mapq));
    }
    Ok(hits)
}

/// Parses one annotation record per non-blank, non-`#` line:
/// `<gene_id> <transcript_id> <feature> <exon_start> <exon_end> <strand>`, e.g.
/// `geneA tx1 exon 100 150 +`. Non-`exon` features are accepted here (and dropped downstream by
/// `build_splice_graph_from_annotation`, matching the real annotation source's contract).
pub fn parse_annotation_lines(text: &str) -> Result<Vec<AnnotationRecord>> {
    let mut records = Vec::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() != 6 {
            return Err(malformed(
                lineno,
                "expected 6 columns: gene_id transcript_id feature exon_start exon_end strand",
            ));
        }
        let start: i32 = cols[3]
            .parse()
            .map_err(|_| malformed(lineno, "exon_start must be an integer"))?;
        let end: i32 = cols[4]
            .parse()
            .map_err(|_| malformed(lineno, "exon_end must be an integer"))?;
        let strand = parse_strand(cols[5])?;
        records.push(AnnotationRecord::new(cols[0], cols[1], cols[2], start, end, strand));
    }
    Ok(records)
}

fn malformed(lineno: usize, msg: &str) -> Error {
    Error::MalformedExample {
        msg: format!("line {}: {}", lineno + 1, msg),
    }
}
