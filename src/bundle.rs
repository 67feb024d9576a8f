//! Per-locus aggregation of hits into a coverage map and junction multiset, and the
//! `build_splice_graph` construction that turns that evidence into a `SpliceGraph`
//! (`SPEC_FULL.md` §4.2).

use std::collections::BTreeMap;

use counter::Counter;
use getset::Getters;
use log::{debug, warn};

use crate::config::Configuration;
use crate::errors::{Error, Result};
use crate::hit::{Hit, RefId};
use crate::imap::IntervalMap;
use crate::sgraph::{BoundaryType, Edge, SpliceGraph, Vertex};

/// A maximal half-open interval of contiguous non-zero coverage, bounded by boundary events.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct PartialExon {
    lpos: i32,
    rpos: i32,
    left_type: BoundaryType,
    right_type: BoundaryType,
    ave: f64,
    dev: f64,
    /// Whether this exon's incident edge weights were rescaled during flow-conservation
    /// reconciliation.
    adjust: bool,
}

/// A contiguous group of alignments on one reference sequence.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Bundle {
    ref_id: RefId,
    lpos: i32,
    rpos: i32,
    hits: Vec<Hit>,
    imap: IntervalMap,
    junctions: Counter<(i32, i32), u32>,
}

impl Bundle {
    pub fn new(ref_id: RefId) -> Self {
        Bundle {
            ref_id,
            lpos: i32::MAX,
            rpos: i32::MIN,
            hits: Vec::new(),
            imap: IntervalMap::new(),
            junctions: Counter::new(),
        }
    }

    pub fn num_hits(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Adds a hit to the bundle. Hits must arrive in non-decreasing position order; an
    /// out-of-order hit is dropped (logged, not propagated) per `SPEC_FULL.md` §7.
    pub fn add_hit(&mut self, hit: Hit) -> Result<()> {
        if let Some(last) = self.hits.last() {
            if hit.pos < last.pos {
                warn!(
                    "dropping out-of-order hit {} at {} (bundle last hit at {})",
                    hit.id, hit.pos, last.pos
                );
                return Err(Error::OutOfOrderHit {
                    pos: hit.pos,
                    rpos: last.pos,
                });
            }
        }

        self.lpos = self.lpos.min(hit.pos);
        self.rpos = self.rpos.max(hit.end());

        let mut rpos = hit.pos;
        use rust_htslib::bam::record::Cigar::*;
        for op in hit.cigar.0.iter() {
            match op {
                Match(l) | Equal(l) | Diff(l) => {
                    self.imap.add(rpos, rpos + *l as i32, 1)?;
                    rpos += *l as i32;
                }
                Del(l) => {
                    rpos += *l as i32;
                }
                RefSkip(l) => {
                    let (a, b) = (rpos, rpos + *l as i32);
                    *self.junctions.entry((a, b)).or_insert(0) += 1;
                    rpos = b;
                }
                Ins(_) | SoftClip(_) | HardClip(_) | Pad(_) => {}
            }
        }

        self.hits.push(hit);
        Ok(())
    }

    /// Builds the splice graph for this bundle, returning the graph together with the partial
    /// exon whose genomic coordinates correspond to each internal vertex (vertex `i + 1` maps to
    /// `exons[i]`, for `i` in `0..exons.len()`).
    pub fn build_splice_graph(&self, config: &Configuration, bundle_index: usize) -> Result<(SpliceGraph, Vec<PartialExon>)> {
        let exons = self.extract_partial_exons(config);
        let exons = merge_low_weight_exons(exons, &self.imap, *config.min_vertex_weight());
        debug!("bundle {}: {} partial exons", bundle_index, exons.len());

        let mut g = SpliceGraph::new();
        let source = g.add_vertex(Vertex::source_sink());
        debug_assert_eq!(source, g.source());

        for exon in &exons {
            g.add_vertex(Vertex::new(
                exon.ave,
                exon.rpos - exon.lpos,
                exon.dev,
                exon.left_type,
                exon.right_type,
            ));
        }
        let sink = g.add_vertex(Vertex::source_sink());
        debug_assert_eq!(sink, exons.len() + 1);

        // adjacency edges: consecutive exons that touch with no intervening gap.
        for i in 0..exons.len().saturating_sub(1) {
            if exons[i].rpos == exons[i + 1].lpos {
                let w = self.imap.coverage_at(exons[i].rpos.saturating_sub(1)) as f64;
                g.add_edge(Edge::new(i + 1, i + 2, w));
            }
        }

        // junction edges, filtered by min_splice_boundary_hits.
        let mut lpos_index: BTreeMap<i32, usize> = BTreeMap::new();
        let mut rpos_index: BTreeMap<i32, usize> = BTreeMap::new();
        for (i, exon) in exons.iter().enumerate() {
            lpos_index.insert(exon.lpos, i + 1);
            rpos_index.insert(exon.rpos, i + 1);
        }
        for (&(a, b), &count) in self.junctions.iter() {
            if count < *config.min_splice_boundary_hits() {
                continue;
            }
            if let (Some(&u), Some(&v)) = (rpos_index.get(&a), lpos_index.get(&b)) {
                g.add_edge(Edge::new(u, v, count as f64));
            }
        }

        // source -> v / v -> sink edges at transcript boundaries.
        for (i, exon) in exons.iter().enumerate() {
            let v = i + 1;
            if exon.left_type == BoundaryType::StartOfTranscript {
                let w = self.imap.coverage_at(exon.lpos) as f64;
                g.add_edge(Edge::new(source, v, w));
            }
            if exon.right_type == BoundaryType::EndOfTranscript {
                let w = self.imap.coverage_at(exon.rpos.saturating_sub(1)) as f64;
                g.add_edge(Edge::new(v, sink, w));
            }
        }

        reconcile_flow(&mut g);

        let mut exons = exons;
        mark_adjusted(&g, &mut exons);

        if !is_acyclic_by_construction(&g) {
            return Err(Error::GraphNotAcyclic { bundle_index });
        }

        Ok((g, exons))
    }

    fn extract_partial_exons(&self, config: &Configuration) -> Vec<PartialExon> {
        if self.hits.is_empty() {
            return Vec::new();
        }

        let mut left_type: BTreeMap<i32, BoundaryType> = BTreeMap::new();
        let mut right_type: BTreeMap<i32, BoundaryType> = BTreeMap::new();
        left_type.insert(self.lpos, BoundaryType::StartOfTranscript);
        right_type.insert(self.rpos, BoundaryType::EndOfTranscript);

        for (&(a, b), &count) in self.junctions.iter() {
            if count < *config.min_splice_boundary_hits() {
                continue;
            }
            right_type.insert(a, BoundaryType::LeftOfJunction);
            left_type.insert(b, BoundaryType::RightOfJunction);
        }

        // zero-coverage transitions: scan the interval map's own entries plus gaps between them.
        let mut prev_end: Option<i32> = None;
        for (range, weight) in self.imap.iter() {
            if weight == 0 {
                continue;
            }
            if let Some(pe) = prev_end {
                if pe < range.start {
                    right_type.entry(pe).or_insert(BoundaryType::EndOfTranscript);
                    left_type
                        .entry(range.start)
                        .or_insert(BoundaryType::StartOfTranscript);
                }
            } else if range.start > self.lpos {
                left_type
                    .entry(range.start)
                    .or_insert(BoundaryType::StartOfTranscript);
            }
            prev_end = Some(range.end);
        }
        if let Some(pe) = prev_end {
            if pe < self.rpos {
                right_type.entry(pe).or_insert(BoundaryType::EndOfTranscript);
            }
        }

        use itertools::Itertools;
        let positions: Vec<i32> = left_type
            .keys()
            .chain(right_type.keys())
            .copied()
            .sorted()
            .dedup()
            .collect();

        let mut exons = Vec::new();
        for w in positions.windows(2) {
            let (l, r) = (w[0], w[1]);
            if self.imap.coverage_at(l) == 0 {
                continue;
            }
            let (ave, dev) = self.imap.stats(l, r);
            exons.push(PartialExon {
                lpos: l,
                rpos: r,
                left_type: *left_type.get(&l).unwrap_or(&BoundaryType::InternalBreakpoint),
                right_type: *right_type.get(&r).unwrap_or(&BoundaryType::InternalBreakpoint),
                ave,
                dev,
                adjust: false,
            });
        }
        exons
    }
}

/// Repeatedly folds any partial exon whose coverage average falls below `min_vertex_weight` into
/// a genomically contiguous neighbour, absorbing its span and recomputing the merged exon's
/// `ave`/`dev` over the combined range (`SPEC_FULL.md` §4.2 step 8 supplement). Prefers merging
/// forward into the next exon; falls back to the previous one when there is no contiguous
/// successor. A degenerate exon with no contiguous neighbour on either side is left as-is — it
/// cannot be folded away without inventing a junction that was never observed.
fn merge_low_weight_exons(mut exons: Vec<PartialExon>, imap: &IntervalMap, min_vertex_weight: f64) -> Vec<PartialExon> {
    if min_vertex_weight <= 0.0 {
        return exons;
    }
    let mut i = 0;
    while i < exons.len() {
        if exons[i].ave >= min_vertex_weight {
            i += 1;
            continue;
        }
        if i + 1 < exons.len() && exons[i].rpos == exons[i + 1].lpos {
            let (lpos, rpos) = (exons[i].lpos, exons[i + 1].rpos);
            let (ave, dev) = imap.stats(lpos, rpos);
            exons[i + 1] = PartialExon {
                lpos,
                rpos,
                left_type: exons[i].left_type,
                right_type: exons[i + 1].right_type,
                ave,
                dev,
                adjust: false,
            };
            exons.remove(i);
            // re-examine the merged exon now sitting at `i` in case it is still under threshold.
        } else if i > 0 && exons[i - 1].rpos == exons[i].lpos {
            let (lpos, rpos) = (exons[i - 1].lpos, exons[i].rpos);
            let (ave, dev) = imap.stats(lpos, rpos);
            exons[i - 1] = PartialExon {
                lpos,
                rpos,
                left_type: exons[i - 1].left_type,
                right_type: exons[i].right_type,
                ave,
                dev,
                adjust: false,
            };
            exons.remove(i);
            i -= 1;
        } else {
            i += 1;
        }
    }
    exons
}

/// Scales each internal vertex's out-edges to match its (already-settled) in-weight, propagating
/// forward in vertex-id order so every internal vertex ends up flow-conserving within the usual
/// numerical slack (`SPEC_FULL.md` §4.2 step 8).
fn reconcile_flow(g: &mut SpliceGraph) {
    for v in 1..g.sink() {
        let in_w = g.in_weight(v);
        let out_w = g.out_weight(v);
        if out_w <= 0.0 || in_w <= 0.0 {
            continue;
        }
        let scale = in_w / out_w;
        for e in g.out_edges(v) {
            let w = *g.edge(e).weight();
            g.edge_mut(e).set_weight(w * scale);
        }
    }
}

fn mark_adjusted(g: &SpliceGraph, exons: &mut [PartialExon]) {
    for (i, exon) in exons.iter_mut().enumerate() {
        let v = i + 1;
        let (win, wout) = (g.in_weight(v), g.out_weight(v));
        exon.adjust = (win - wout).abs() > 1e-9;
    }
}

fn is_acyclic_by_construction(g: &SpliceGraph) -> bool {
    (0..g.num_edges())
        .map(|e| g.edge(e))
        .all(|e| e.from() < e.to())
}
