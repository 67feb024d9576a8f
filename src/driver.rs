//! Orchestrates per-bundle extraction, graph construction, decomposition and emission
//! (`SPEC_FULL.md` §4.5). The driver owns one immutable `Configuration`, threading it by
//! reference through every bundle and graph it builds; it never touches global state itself
//! (logger setup is left to the binary entry point, per §7's "ambient error/logging stack").

use bio_types::strand::Strand;
use getset::Getters;
use log::{debug, info, warn};

use crate::annotation::{build_splice_graph_from_annotation, AnnotationRecord};
use crate::bundle::Bundle;
use crate::config::Configuration;
use crate::decomposer::{Decomposer, DecomposerKind, Path};
use crate::errors::Error;
use crate::hit::{Hit, RefId};

/// One emitted transcript: bundle index, strand, the exon intervals a path's vertex sequence
/// resolves to, and an abundance score (`SPEC_FULL.md` §6 "Outputs").
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct TranscriptRecord {
    bundle_index: usize,
    strand: Strand,
    exons: Vec<(i32, i32)>,
    abundance: f64,
    kind: DecomposerKind,
    unbridged: bool,
    gene_id: Option<String>,
    transcript_id: Option<String>,
}

pub struct AssemblerDriver {
    config: Configuration,
}

impl AssemblerDriver {
    pub fn new(config: Configuration) -> Self {
        AssemblerDriver { config }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Consumes hits from `hits` (already in reference order, already filtered per
    /// `hit::should_filter`), bundling and assembling them sequentially.
    pub fn run(
        &self,
        hits: impl IntoIterator<Item = Hit>,
        decomposer: &dyn Decomposer,
        strand: Strand,
    ) -> Vec<TranscriptRecord> {
        let bundles = self.collect_bundles(hits);
        bundles
            .into_iter()
            .enumerate()
            .filter_map(|(idx, bundle)| self.assemble_bundle(idx, bundle, decomposer, strand))
            .flatten()
            .collect()
    }

    /// Same bundling/discard decisions as `run`, but dispatches each closed bundle to a
    /// `rayon` worker pool once all bundles have been materialized, preserving output order by
    /// the bundle's stable index (`SPEC_FULL.md` §5).
    pub fn run_parallel(
        &self,
        hits: impl IntoIterator<Item = Hit>,
        decomposer: &(dyn Decomposer + Sync),
        strand: Strand,
    ) -> Vec<TranscriptRecord> {
        use rayon::prelude::*;

        let bundles = self.collect_bundles(hits);
        let mut results: Vec<(usize, Vec<TranscriptRecord>)> = bundles
            .into_par_iter()
            .enumerate()
            .filter_map(|(idx, bundle)| {
                self.assemble_bundle(idx, bundle, decomposer, strand)
                    .map(|records| (idx, records))
            })
            .collect();
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().flat_map(|(_, records)| records).collect()
    }

    /// Groups `records` by `gene_id`, builds one splice graph per gene directly from exon
    /// coordinates (no coverage map), and runs `decomposer` over each (`SPEC_FULL.md` §4.5
    /// "Supplement").
    pub fn run_from_annotation(
        &self,
        records: impl IntoIterator<Item = AnnotationRecord>,
        decomposer: &dyn Decomposer,
    ) -> Vec<TranscriptRecord> {
        let mut out = Vec::new();
        for (bundle_index, (gene_id, graph, spans)) in
            build_splice_graph_from_annotation(records).into_iter().enumerate()
        {
            let paths = match decomposer.decompose(graph, bundle_index) {
                Ok(paths) => paths,
                Err(err) => {
                    warn!("gene {}: decomposition failed: {}", gene_id, err);
                    continue;
                }
            };
            for path in paths {
                let exons = path
                    .vertices()
                    .iter()
                    .filter(|&&v| v != 0 && v != spans.len() + 1)
                    .map(|&v| {
                        let span = &spans[v - 1];
                        (*span.start(), *span.end())
                    })
                    .collect();
                out.push(TranscriptRecord {
                    bundle_index,
                    strand: Strand::Unknown,
                    exons,
                    abundance: *path.abundance(),
                    kind: *path.kind(),
                    unbridged: *path.unbridged(),
                    gene_id: Some(gene_id.clone()),
                    transcript_id: None,
                });
            }
        }
        out
    }

    fn collect_bundles(&self, hits: impl IntoIterator<Item = Hit>) -> Vec<Bundle> {
        let mut bundles = Vec::new();
        let mut current: Option<Bundle> = None;

        for hit in hits {
            if *self.config.max_num_bundles() > 0 && bundles.len() >= *self.config.max_num_bundles() {
                break;
            }

            let starts_new = match &current {
                None => true,
                Some(bundle) => {
                    *bundle.ref_id() != hit.ref_id || hit.pos > *bundle.rpos() + *self.config.min_bundle_gap()
                }
            };

            if starts_new {
                if let Some(finished) = current.take() {
                    bundles.push(finished);
                }
                current = Some(Bundle::new(hit.ref_id));
            } else if *self.config.max_hits_per_bundle() > 0
                && current.as_ref().unwrap().num_hits() >= *self.config.max_hits_per_bundle()
            {
                warn!(
                    "bundle on ref {} hit max_hits_per_bundle ({}); closing early",
                    hit.ref_id,
                    self.config.max_hits_per_bundle()
                );
                bundles.push(current.take().unwrap());
                current = Some(Bundle::new(hit.ref_id));
            }

            if let Err(err) = current.as_mut().unwrap().add_hit(hit) {
                debug!("dropping hit: {}", err);
            }
        }
        if let Some(finished) = current.take() {
            bundles.push(finished);
        }
        bundles
    }

    fn assemble_bundle(
        &self,
        bundle_index: usize,
        bundle: Bundle,
        decomposer: &dyn Decomposer,
        strand: Strand,
    ) -> Option<Vec<TranscriptRecord>> {
        let ref_id: RefId = *bundle.ref_id();
        if bundle.num_hits() < *self.config.min_num_hits_in_bundle() {
            debug!(
                "bundle {} on ref {} discarded: {} hits < min_num_hits_in_bundle",
                bundle_index,
                ref_id,
                bundle.num_hits()
            );
            return None;
        }

        let (graph, exons) = match bundle.build_splice_graph(&self.config, bundle_index) {
            Ok(built) => built,
            Err(Error::GraphNotAcyclic { bundle_index }) => {
                log::error!("bundle {} is not acyclic; skipping", bundle_index);
                return None;
            }
            Err(err) => {
                warn!("bundle {} failed to build a splice graph: {}", bundle_index, err);
                return None;
            }
        };

        info!(
            "bundle {}: {} vertices, {} edges",
            bundle_index,
            graph.num_vertices(),
            graph.num_edges()
        );

        let paths = match decomposer.decompose(graph, bundle_index) {
            Ok(paths) => paths,
            Err(err) => {
                warn!("bundle {}: decomposition failed: {}", bundle_index, err);
                return None;
            }
        };

        let records = paths
            .into_iter()
            .map(|path| {
                let exon_intervals = path
                    .vertices()
                    .iter()
                    .filter(|&&v| v != 0 && v != exons.len() + 1)
                    .map(|&v| {
                        let exon = &exons[v - 1];
                        (*exon.lpos(), *exon.rpos())
                    })
                    .collect();
                TranscriptRecord {
                    bundle_index,
                    strand,
                    exons: exon_intervals,
                    abundance: *path.abundance(),
                    kind: *path.kind(),
                    unbridged: *path.unbridged(),
                    gene_id: None,
                    transcript_id: None,
                }
            })
            .collect();
        Some(records)
    }
}
