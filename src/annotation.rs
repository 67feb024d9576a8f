//! Building a splice graph directly from a reference annotation, bypassing the coverage map
//! entirely (`SPEC_FULL.md` §4.5 "assemble_gtf" path). The GTF text grammar itself stays an
//! external collaborator's concern; this module only fixes the post-parse record shape and the
//! per-gene graph construction.

use std::collections::BTreeMap;

use bio_types::strand::Strand;
use getset::Getters;

use crate::sgraph::{BoundaryType, Edge, SpliceGraph, Vertex};

/// One post-parse annotation line. Only records with `feature == "exon"` are consumed by
/// `build_splice_graph_from_annotation`; callers filter on ingestion, matching the external
/// annotation source's contract (`SPEC_FULL.md` §6).
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct AnnotationRecord {
    gene_id: String,
    transcript_id: String,
    feature: String,
    exon_start: i32,
    exon_end: i32,
    strand: Strand,
}

impl AnnotationRecord {
    pub fn new(
        gene_id: impl Into<String>,
        transcript_id: impl Into<String>,
        feature: impl Into<String>,
        exon_start: i32,
        exon_end: i32,
        strand: Strand,
    ) -> Self {
        AnnotationRecord {
            gene_id: gene_id.into(),
            transcript_id: transcript_id.into(),
            feature: feature.into(),
            exon_start,
            exon_end,
            strand,
        }
    }

    fn is_exon(&self) -> bool {
        self.feature == "exon"
    }
}

/// The genomic span corresponding to one internal vertex of a graph built from annotation
/// records; vertex `i + 1` maps to `exons[i]`, matching `bundle::Bundle::build_splice_graph`'s
/// convention.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct ExonSpan {
    start: i32,
    end: i32,
}

/// Groups `records` by `gene_id` and builds one splice graph per gene directly from exon
/// coordinates: distinct `(start, end)` spans become vertices in genomic order, and an edge
/// between two spans is weighted by the number of transcripts whose exon list visits that pair
/// consecutively (source→first-exon and last-exon→sink edges likewise carry one unit of weight
/// per transcript that starts/ends there). There is no coverage map in this path, so every edge's
/// weight is this transcript-support count rather than a read-derived quantity (`SPEC_FULL.md` §3
/// "Configuration"/§8 S8).
pub fn build_splice_graph_from_annotation(
    records: impl IntoIterator<Item = AnnotationRecord>,
) -> Vec<(String, SpliceGraph, Vec<ExonSpan>)> {
    let mut by_gene: BTreeMap<String, Vec<AnnotationRecord>> = BTreeMap::new();
    for record in records {
        if !record.is_exon() {
            continue;
        }
        by_gene.entry(record.gene_id.clone()).or_default().push(record);
    }

    by_gene
        .into_iter()
        .map(|(gene_id, records)| {
            let (graph, spans) = build_gene_graph(&records);
            (gene_id, graph, spans)
        })
        .collect()
}

fn build_gene_graph(records: &[AnnotationRecord]) -> (SpliceGraph, Vec<ExonSpan>) {
    let mut by_transcript: BTreeMap<&str, Vec<&AnnotationRecord>> = BTreeMap::new();
    for r in records {
        by_transcript.entry(r.transcript_id.as_str()).or_default().push(r);
    }
    for exons in by_transcript.values_mut() {
        exons.sort_by_key(|r| (r.exon_start, r.exon_end));
    }

    let mut spans: Vec<(i32, i32)> = records.iter().map(|r| (r.exon_start, r.exon_end)).collect();
    spans.sort_unstable();
    spans.dedup();

    let vertex_of: BTreeMap<(i32, i32), usize> = spans
        .iter()
        .enumerate()
        .map(|(i, &span)| (span, i + 1))
        .collect();

    let mut g = SpliceGraph::new();
    let source = g.add_vertex(Vertex::source_sink());
    for &(start, end) in &spans {
        g.add_vertex(Vertex::new(
            1.0,
            end - start,
            0.0,
            BoundaryType::LeftOfJunction,
            BoundaryType::RightOfJunction,
        ));
    }
    let sink = g.add_vertex(Vertex::source_sink());

    let mut edge_weight: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for exons in by_transcript.values() {
        if exons.is_empty() {
            continue;
        }
        let first = vertex_of[&(exons[0].exon_start, exons[0].exon_end)];
        *edge_weight.entry((source, first)).or_insert(0.0) += 1.0;
        let last = vertex_of[&(
            exons.last().unwrap().exon_start,
            exons.last().unwrap().exon_end,
        )];
        *edge_weight.entry((last, sink)).or_insert(0.0) += 1.0;

        for pair in exons.windows(2) {
            let u = vertex_of[&(pair[0].exon_start, pair[0].exon_end)];
            let v = vertex_of[&(pair[1].exon_start, pair[1].exon_end)];
            *edge_weight.entry((u, v)).or_insert(0.0) += 1.0;
        }
    }

    for (&(u, v), &w) in &edge_weight {
        g.add_edge(Edge::new(u, v, w));
    }

    let exon_spans = spans
        .into_iter()
        .map(|(start, end)| ExonSpan { start, end })
        .collect();
    (g, exon_spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s8_annotation_path_mirrors_two_exon_junction() {
        let records = vec![
            AnnotationRecord::new("geneA", "tx1", "exon", 100, 150, Strand::Forward),
            AnnotationRecord::new("geneA", "tx1", "exon", 250, 300, Strand::Forward),
        ];
        let mut graphs = build_splice_graph_from_annotation(records);
        assert_eq!(graphs.len(), 1);
        let (gene_id, g, spans) = graphs.remove(0);
        assert_eq!(gene_id, "geneA");
        assert_eq!(spans.len(), 2);
        // isomorphic to S3's shape: source, two exon vertices, sink, one junction edge.
        assert_eq!(g.num_vertices(), 4);
        assert_eq!(g.num_edges(), 3);
    }

    #[test]
    fn non_exon_features_are_dropped() {
        let records = vec![
            AnnotationRecord::new("geneA", "tx1", "CDS", 100, 150, Strand::Forward),
            AnnotationRecord::new("geneA", "tx1", "exon", 100, 150, Strand::Forward),
        ];
        let graphs = build_splice_graph_from_annotation(records);
        let (_, g, spans) = &graphs[0];
        assert_eq!(spans.len(), 1);
        assert_eq!(g.num_vertices(), 3);
    }
}
