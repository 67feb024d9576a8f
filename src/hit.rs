//! A single spliced alignment. Parsing a BAM/SAM record into a `Hit` is an external collaborator's
//! job (`SPEC_FULL.md` §1); this module only fixes the post-parse shape the core consumes, reusing
//! `rust-htslib`'s CIGAR type as the wire representation.

use bio_types::strand::Strand;
use rust_htslib::bam::record::CigarString;

/// Reference sequence identifier, analogous to a BAM `tid`.
pub type RefId = i32;

/// A single spliced alignment. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Hit {
    pub ref_id: RefId,
    /// 0-based leftmost reference position.
    pub pos: i32,
    pub cigar: CigarString,
    pub strand: Strand,
    pub mapq: u8,
    /// Confidence derived from `mapq`, mirroring the reference implementation's (disabled)
    /// `qual <= 4` cutoff as a soft weight rather than a hard filter. Carried through for
    /// diagnostics only: the coverage-map invariant (`SPEC_FULL.md` §3/§8) defines `coverage_at`
    /// as a literal hit count, so `Bundle::add_hit` intentionally does not scale by this value.
    pub weight: f64,
    /// Synthetic or read-derived identifier, used only to name evidence in diagnostics.
    pub id: String,
    /// Paired-mate linkage, when known.
    pub mate: Option<MateLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new)]
pub struct MateLink {
    pub ref_id: RefId,
    pub pos: i32,
}

impl Hit {
    pub fn new(id: impl Into<String>, ref_id: RefId, pos: i32, cigar: CigarString, strand: Strand, mapq: u8) -> Self {
        Hit {
            ref_id,
            pos,
            cigar,
            strand,
            mapq,
            weight: mapq_to_weight(mapq),
            id: id.into(),
            mate: None,
        }
    }

    pub fn with_mate(mut self, mate: MateLink) -> Self {
        self.mate = Some(mate);
        self
    }

    /// Reference-coordinate end position implied by the cigar (sum of ref-consuming ops).
    pub fn end(&self) -> i32 {
        self.pos + ref_consumed(&self.cigar)
    }
}

fn mapq_to_weight(mapq: u8) -> f64 {
    // Pr(correct mapping) under the PHRED convention, floored so a hit is never fully discounted.
    1.0 - 10f64.powf(-(mapq as f64) / 10.0).min(0.999)
}

fn ref_consumed(cigar: &CigarString) -> i32 {
    use rust_htslib::bam::record::Cigar::*;
    cigar
        .0
        .iter()
        .map(|op| match op {
            Match(l) | Del(l) | RefSkip(l) | Equal(l) | Diff(l) => *l as i32,
            Ins(_) | SoftClip(_) | HardClip(_) | Pad(_) => 0,
        })
        .sum()
}

/// True if the hit should be filtered out before reaching the core: unmapped, secondary, empty
/// cigar, or more than 7 cigar operations (`SPEC_FULL.md` §6).
pub fn should_filter(unmapped: bool, secondary: bool, cigar: &CigarString) -> bool {
    unmapped || secondary || cigar.0.is_empty() || cigar.0.len() > 7
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_htslib::bam::record::{Cigar, CigarString};

    fn cigar(ops: &[Cigar]) -> CigarString {
        CigarString(ops.to_vec())
    }

    #[test]
    fn end_accounts_for_splice_and_ignores_insertions() {
        let c = cigar(&[Cigar::Match(50), Cigar::RefSkip(100), Cigar::Match(50)]);
        let h = Hit::new("r1", 0, 100, c, Strand::Forward, 60);
        assert_eq!(h.end(), 100 + 50 + 100 + 50);
    }

    #[test]
    fn filters_match_bam_flag_contract() {
        let c = cigar(&[Cigar::Match(10)]);
        assert!(should_filter(true, false, &c));
        assert!(should_filter(false, true, &c));
        assert!(!should_filter(false, false, &c));
        assert!(should_filter(false, false, &cigar(&[])));
        let many: Vec<Cigar> = (0..8).map(|_| Cigar::Match(1)).collect();
        assert!(should_filter(false, false, &CigarString(many)));
    }
}
