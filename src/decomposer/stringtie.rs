//! A baseline `Decomposer`, standing in for the comparison algorithm referenced throughout
//! `SPEC_FULL.md` (the real external "stringtie" tool stays out of scope). Repeatedly finds the
//! maximum-bottleneck source→sink path in the residual graph — the path maximizing the minimum
//! edge weight along it, found by a single topological DP pass — subtracts that bottleneck
//! capacity from every edge on the path, and repeats until no path with non-negligible capacity
//! remains.

use crate::errors::Result;
use crate::sgraph::{BridgeId, SpliceGraph, VertexId};

use super::{Decomposer, DecomposerKind, Path};

/// Below this bottleneck capacity a residual path is considered exhausted.
const CAPACITY_FLOOR: f64 = 1e-9;

pub struct StringtieDecomposer;

impl StringtieDecomposer {
    pub fn new() -> Self {
        StringtieDecomposer
    }
}

impl Default for StringtieDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

impl Decomposer for StringtieDecomposer {
    fn kind(&self) -> DecomposerKind {
        DecomposerKind::Stringtie
    }

    fn decompose(&self, mut graph: SpliceGraph, _bundle_index: usize) -> Result<Vec<Path>> {
        let source = graph.source();
        let sink = graph.sink();
        let mut paths = Vec::new();

        loop {
            let (capacity, vertices, edges_on_path) = match heaviest_bottleneck_path(&graph, source, sink) {
                Some(found) if found.0 > CAPACITY_FLOOR => found,
                _ => break,
            };

            let mut bridges: Vec<BridgeId> = edges_on_path
                .iter()
                .flat_map(|&e| graph.edge(e).bridges().clone())
                .collect();
            bridges.sort_unstable();
            bridges.dedup();

            for &e in &edges_on_path {
                let w = *graph.edge(e).weight();
                graph.edge_mut(e).set_weight((w - capacity).max(0.0));
            }

            paths.push(Path::new(vertices, capacity, self.kind()).with_bridges(bridges));
        }

        Ok(paths)
    }
}

/// One topological DP pass: `dp[v]` is the largest bottleneck (minimum edge weight) achievable
/// along any source→v path; ties broken by the edge ordering `SpliceGraph::in_edges` already
/// provides (ascending source vertex id), for determinism.
fn heaviest_bottleneck_path(
    g: &SpliceGraph,
    source: VertexId,
    sink: VertexId,
) -> Option<(f64, Vec<VertexId>, Vec<usize>)> {
    let n = g.num_vertices();
    let mut dp = vec![0.0f64; n];
    let mut parent_edge: Vec<Option<usize>> = vec![None; n];
    dp[source] = f64::INFINITY;

    for v in (source + 1)..n {
        let mut best = 0.0;
        let mut best_edge = None;
        for e in g.in_edges(v) {
            let edge = g.edge(e);
            let u = *edge.from();
            let cap = dp[u].min(*edge.weight());
            if cap > best {
                best = cap;
                best_edge = Some(e);
            }
        }
        dp[v] = best;
        parent_edge[v] = best_edge;
    }

    if dp[sink] <= CAPACITY_FLOOR {
        return None;
    }

    let mut vertices = vec![sink];
    let mut edges_on_path = Vec::new();
    let mut cur = sink;
    while cur != source {
        let e = parent_edge[cur]?;
        edges_on_path.push(e);
        cur = *g.edge(e).from();
        vertices.push(cur);
    }
    vertices.reverse();
    edges_on_path.reverse();
    Some((dp[sink], vertices, edges_on_path))
}
