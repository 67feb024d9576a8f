//! The scallop decomposition strategy (`SPEC_FULL.md` §4.4). Repeatedly removes the
//! lowest-degree internal vertex, routing its incident flow through a compatible in/out pairing,
//! until only direct source→sink edges remain.

use std::cmp::Reverse;
use std::collections::HashSet;

use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

use crate::config::Configuration;
use crate::errors::{Error, Result};
use crate::sgraph::{BridgeId, SpliceGraph, VertexId};

use super::{Decomposer, DecomposerKind, Path};

/// "scallop1" always falls through to the greedy max-pair strategy; "scallop2" attempts a perfect
/// matching before falling back to greedy. The reference source's two near-duplicate types are
/// modeled as one `ScallopDecomposer` with this strategy knob (`SPEC_FULL.md` §9 "Polymorphism").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScallopStrategy {
    Scallop1,
    Scallop2,
}

pub struct ScallopDecomposer {
    strategy: ScallopStrategy,
    bridge_strict: bool,
    epsilon: f64,
}

impl ScallopDecomposer {
    pub fn new(strategy: ScallopStrategy, config: &Configuration) -> Self {
        ScallopDecomposer {
            strategy,
            bridge_strict: *config.decomposer_bridge_strict(),
            epsilon: *config.reconciliation_epsilon(),
        }
    }
}

#[derive(Debug, Clone)]
struct WEdge {
    from: VertexId,
    to: VertexId,
    weight: f64,
    bridges: Vec<BridgeId>,
    provenance: Vec<VertexId>,
    unbridged: bool,
}

/// One (in-edge, out-edge, routed-weight) triple chosen while decomposing a vertex.
struct Triple {
    in_edge: usize,
    out_edge: usize,
    weight: f64,
    /// Set when this triple was routed by the bridge-blind fallback, overriding bridge evidence
    /// that forbade every compatible pairing (`SPEC_FULL.md` §4.4 "Failure modes").
    unbridged: bool,
}

impl Triple {
    fn new(in_edge: usize, out_edge: usize, weight: f64) -> Self {
        Triple {
            in_edge,
            out_edge,
            weight,
            unbridged: false,
        }
    }
}

struct Working {
    edges: Vec<Option<WEdge>>,
    out_adj: Vec<Vec<usize>>,
    in_adj: Vec<Vec<usize>>,
    alive: Vec<bool>,
}

impl Working {
    fn from_graph(g: &SpliceGraph) -> Self {
        let n = g.num_vertices();
        let mut w = Working {
            edges: Vec::new(),
            out_adj: vec![Vec::new(); n],
            in_adj: vec![Vec::new(); n],
            alive: vec![true; n],
        };
        for idx in g.edges_ordered() {
            let e = g.edge(idx);
            w.push_edge(WEdge {
                from: *e.from(),
                to: *e.to(),
                weight: *e.weight(),
                bridges: e.bridges().clone(),
                provenance: vec![*e.from(), *e.to()],
                unbridged: false,
            });
        }
        w
    }

    fn push_edge(&mut self, e: WEdge) -> usize {
        let idx = self.edges.len();
        self.out_adj[e.from].push(idx);
        self.in_adj[e.to].push(idx);
        self.edges.push(Some(e));
        idx
    }

    fn remove_edge(&mut self, idx: usize) -> WEdge {
        let e = self.edges[idx].take().expect("edge removed twice");
        self.out_adj[e.from].retain(|&i| i != idx);
        self.in_adj[e.to].retain(|&i| i != idx);
        e
    }

    fn in_edges(&self, v: VertexId) -> Vec<usize> {
        let mut ids = self.in_adj[v].clone();
        ids.sort_by_key(|&e| self.edges[e].as_ref().unwrap().from);
        ids
    }

    fn out_edges(&self, v: VertexId) -> Vec<usize> {
        let mut ids = self.out_adj[v].clone();
        ids.sort_by_key(|&e| self.edges[e].as_ref().unwrap().to);
        ids
    }

    fn degree(&self, v: VertexId) -> usize {
        self.in_adj[v].len() + self.out_adj[v].len()
    }

    fn total_weight(&self, v: VertexId) -> f64 {
        let out: f64 = self.out_adj[v].iter().map(|&e| self.edges[e].as_ref().unwrap().weight).sum();
        if out > 0.0 {
            return out;
        }
        self.in_adj[v].iter().map(|&e| self.edges[e].as_ref().unwrap().weight).sum()
    }
}

fn compatible(a: &WEdge, b: &WEdge) -> bool {
    if a.bridges.is_empty() || b.bridges.is_empty() {
        return true;
    }
    a.bridges.iter().any(|x| b.bridges.contains(x))
}

impl Decomposer for ScallopDecomposer {
    fn kind(&self) -> DecomposerKind {
        DecomposerKind::Scallop
    }

    fn decompose(&self, graph: SpliceGraph, bundle_index: usize) -> Result<Vec<Path>> {
        let source = graph.source();
        let sink = graph.sink();
        let mut w = Working::from_graph(&graph);
        let mut paths = Vec::new();

        let mut pq: PriorityQueue<VertexId, Reverse<(usize, OrderedFloat<f64>, VertexId)>> = PriorityQueue::new();
        for v in 1..sink {
            pq.push(v, priority_of(&w, v));
        }

        while let Some((v, _)) = pq.pop() {
            if !w.alive[v] {
                continue;
            }
            w.alive[v] = false;

            let ins = w.in_edges(v);
            let outs = w.out_edges(v);
            let touched = self.decompose_vertex(&mut w, &ins, &outs, bundle_index)?;

            for idx in ins.iter().chain(outs.iter()) {
                if w.edges[*idx].is_some() {
                    w.remove_edge(*idx);
                }
            }

            for (from, to, weight, bridges, provenance, unbridged) in touched {
                if from == source && to == sink {
                    paths.push(
                        Path::new(provenance, weight, self.kind())
                            .with_unbridged(unbridged)
                            .with_bridges(bridges),
                    );
                } else {
                    w.push_edge(WEdge {
                        from,
                        to,
                        weight,
                        bridges,
                        provenance,
                        unbridged,
                    });
                }
            }

            for u in 0..w.alive.len() {
                if w.alive[u] && u != source && u != sink {
                    pq.push_decrease(u, priority_of(&w, u));
                }
            }
        }

        // Every remaining live edge is a direct source->sink edge; each is one final path.
        for idx in 0..w.edges.len() {
            if let Some(e) = &w.edges[idx] {
                paths.push(
                    Path::new(e.provenance.clone(), e.weight, self.kind())
                        .with_unbridged(e.unbridged)
                        .with_bridges(e.bridges.clone()),
                );
            }
        }

        self.check_reconstruction(&graph, &paths, bundle_index);

        Ok(paths)
    }
}

fn priority_of(w: &Working, v: VertexId) -> Reverse<(usize, OrderedFloat<f64>, VertexId)> {
    Reverse((w.degree(v), OrderedFloat(w.total_weight(v)), v))
}

type FusedEdge = (VertexId, VertexId, f64, Vec<BridgeId>, Vec<VertexId>, bool);

impl ScallopDecomposer {
    /// Decomposes one vertex's incident flow into a set of fused (from, to, weight, bridges,
    /// provenance, unbridged) tuples, per `SPEC_FULL.md` §4.4 steps 2-4.
    fn decompose_vertex(
        &self,
        w: &mut Working,
        ins: &[usize],
        outs: &[usize],
        bundle_index: usize,
    ) -> Result<Vec<FusedEdge>> {
        if ins.is_empty() && outs.is_empty() {
            return Ok(Vec::new());
        }

        let triples = if ins.len() == 1 || outs.len() == 1 {
            self.trivial_split(w, ins, outs)
        } else if self.strategy == ScallopStrategy::Scallop2 && ins.len() == outs.len() {
            match self.perfect_matching(w, ins, outs) {
                Some(t) => t,
                None => self.greedy_max_pair(w, ins, outs, bundle_index)?,
            }
        } else {
            self.greedy_max_pair(w, ins, outs, bundle_index)?
        };

        let mut fused = Vec::with_capacity(triples.len());
        for t in triples {
            let in_e = w.edges[t.in_edge].as_ref().unwrap();
            let out_e = w.edges[t.out_edge].as_ref().unwrap();
            let mut bridges = in_e.bridges.clone();
            bridges.extend(out_e.bridges.iter().copied());
            bridges.sort_unstable();
            bridges.dedup();
            let mut provenance = in_e.provenance.clone();
            provenance.extend(out_e.provenance.iter().skip(1));
            let unbridged = in_e.unbridged || out_e.unbridged || t.unbridged;
            fused.push((in_e.from, out_e.to, t.weight, bridges, provenance, unbridged));
        }
        Ok(fused)
    }

    /// Emits a `DecompositionInconsistent` diagnostic (logged, not propagated — `SPEC_FULL.md` §7
    /// treats this kind as recoverable) for any original edge whose routed path abundance fails
    /// to reproduce its weight within `self.epsilon`.
    fn check_reconstruction(&self, graph: &SpliceGraph, paths: &[Path], bundle_index: usize) {
        for idx in graph.edges_ordered() {
            let edge = graph.edge(idx);
            let (from, to, weight) = (*edge.from(), *edge.to(), *edge.weight());
            let routed: f64 = paths
                .iter()
                .filter(|p| p.vertices().windows(2).any(|pair| pair[0] == from && pair[1] == to))
                .map(|p| *p.abundance())
                .sum();
            let residual = (weight - routed).abs();
            if residual > self.epsilon * weight.max(1.0) {
                let diag = Error::DecompositionInconsistent {
                    bundle_index,
                    from,
                    to,
                    residual,
                    epsilon: self.epsilon,
                };
                log::warn!("{}", diag);
            }
        }
    }

    fn trivial_split(&self, w: &Working, ins: &[usize], outs: &[usize]) -> Vec<Triple> {
        if ins.len() == 1 && outs.len() == 1 {
            let weight = w.edges[ins[0]].as_ref().unwrap().weight.min(w.edges[outs[0]].as_ref().unwrap().weight);
            return vec![Triple::new(ins[0], outs[0], weight)];
        }
        if ins.len() == 1 {
            return outs
                .iter()
                .map(|&o| Triple::new(ins[0], o, w.edges[o].as_ref().unwrap().weight))
                .collect();
        }
        ins.iter()
            .map(|&i| Triple::new(i, outs[0], w.edges[i].as_ref().unwrap().weight))
            .collect()
    }

    /// Attempts a weight-preserving perfect matching between `ins` and `outs` under the
    /// compatibility constraint. Returns `None` if no such matching exists.
    fn perfect_matching(&self, w: &Working, ins: &[usize], outs: &[usize]) -> Option<Vec<Triple>> {
        let mut used: HashSet<usize> = HashSet::new();
        let mut triples = Vec::with_capacity(ins.len());
        for &i in ins {
            let edge_i = w.edges[i].as_ref().unwrap();
            let m = outs.iter().find(|&&o| {
                !used.contains(&o)
                    && compatible(edge_i, w.edges[o].as_ref().unwrap())
                    && (edge_i.weight - w.edges[o].as_ref().unwrap().weight).abs() <= self.epsilon * edge_i.weight.max(1e-9)
            })?;
            used.insert(*m);
            triples.push(Triple::new(i, *m, edge_i.weight));
        }
        Some(triples)
    }

    /// Repeatedly routes the maximal compatible `min(w_i, w_j)` pair, distributing any residual
    /// imbalance proportionally across the remaining edges on the heavier side. Falls back to
    /// ignoring bridge compatibility if strict compatibility leaves a non-zero-weight edge
    /// unroutable, unless `decomposer_bridge_strict` demands a hard error.
    fn greedy_max_pair(&self, w: &Working, ins: &[usize], outs: &[usize], bundle_index: usize) -> Result<Vec<Triple>> {
        match self.greedy_max_pair_with(w, ins, outs, true) {
            Some(triples) => Ok(triples),
            None => {
                if self.bridge_strict {
                    let vertex = w.edges[ins[0]].as_ref().unwrap().to;
                    let bridge_ids: Vec<BridgeId> = ins
                        .iter()
                        .chain(outs.iter())
                        .flat_map(|&e| w.edges[e].as_ref().unwrap().bridges.clone())
                        .collect();
                    return Err(Error::IncompatibleBridge { vertex, bridge_ids });
                }
                log::warn!(
                    "bundle {}: bridge evidence left an impasse; retrying vertex decomposition bridge-blind",
                    bundle_index
                );
                let mut triples = self
                    .greedy_max_pair_with(w, ins, outs, false)
                    .expect("bridge-blind greedy matching always succeeds: every pair is compatible");
                for t in &mut triples {
                    t.unbridged = true;
                }
                Ok(triples)
            }
        }
    }

    fn greedy_max_pair_with(&self, w: &Working, ins: &[usize], outs: &[usize], respect_bridges: bool) -> Option<Vec<Triple>> {
        let mut remaining_in: Vec<f64> = ins.iter().map(|&i| w.edges[i].as_ref().unwrap().weight).collect();
        let mut remaining_out: Vec<f64> = outs.iter().map(|&o| w.edges[o].as_ref().unwrap().weight).collect();
        let mut triples = Vec::new();

        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for (ii, &i) in ins.iter().enumerate() {
                if remaining_in[ii] <= 1e-12 {
                    continue;
                }
                let edge_i = w.edges[i].as_ref().unwrap();
                for (oo, &o) in outs.iter().enumerate() {
                    if remaining_out[oo] <= 1e-12 {
                        continue;
                    }
                    if respect_bridges && !compatible(edge_i, w.edges[o].as_ref().unwrap()) {
                        continue;
                    }
                    let m = remaining_in[ii].min(remaining_out[oo]);
                    if best.map(|(_, _, bw)| m > bw).unwrap_or(true) {
                        best = Some((ii, oo, m));
                    }
                }
            }
            match best {
                Some((ii, oo, m)) => {
                    triples.push(Triple::new(ins[ii], outs[oo], m));
                    remaining_in[ii] -= m;
                    remaining_out[oo] -= m;
                }
                None => break,
            }
        }

        let in_total: f64 = remaining_in.iter().sum();
        let out_total: f64 = remaining_out.iter().sum();
        if in_total <= 1e-9 && out_total <= 1e-9 {
            return Some(triples);
        }

        if respect_bridges {
            // a non-zero residual under strict bridge compatibility means some edge simply has
            // nowhere compatible to route to: treat as an impasse and let the caller retry
            // bridge-blind.
            if in_total > 1e-9 || out_total > 1e-9 {
                let unroutable = remaining_in.iter().any(|&r| r > 1e-9) && remaining_out.iter().all(|&r| r <= 1e-9)
                    || remaining_out.iter().any(|&r| r > 1e-9) && remaining_in.iter().all(|&r| r <= 1e-9);
                if unroutable {
                    return None;
                }
            }
        }

        // distribute leftover imbalance proportionally across the side with remaining weight.
        if in_total > 1e-9 {
            for (ii, &i) in ins.iter().enumerate() {
                if remaining_in[ii] <= 1e-12 {
                    continue;
                }
                let share = remaining_in[ii];
                let best_out = outs
                    .iter()
                    .enumerate()
                    .filter(|(_, &o)| !respect_bridges || compatible(w.edges[i].as_ref().unwrap(), w.edges[o].as_ref().unwrap()))
                    .max_by_key(|(oo, _)| OrderedFloat(w.edges[outs[*oo]].as_ref().unwrap().weight));
                if let Some((_, &o)) = best_out {
                    triples.push(Triple::new(i, o, share));
                }
            }
        } else if out_total > 1e-9 {
            for (oo, &o) in outs.iter().enumerate() {
                if remaining_out[oo] <= 1e-12 {
                    continue;
                }
                let share = remaining_out[oo];
                let best_in = ins
                    .iter()
                    .enumerate()
                    .filter(|(_, &i)| !respect_bridges || compatible(w.edges[i].as_ref().unwrap(), w.edges[o].as_ref().unwrap()))
                    .max_by_key(|(ii, _)| OrderedFloat(w.edges[ins[*ii]].as_ref().unwrap().weight));
                if let Some((_, &i)) = best_in {
                    triples.push(Triple::new(i, o, share));
                }
            }
        }

        Some(triples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sgraph::{BoundaryType, Edge, Vertex};

    fn exon(w: f64) -> Vertex {
        Vertex::new(w, 10, 0.0, BoundaryType::StartOfTranscript, BoundaryType::EndOfTranscript)
    }

    #[test]
    fn s2_single_path() {
        let mut g = SpliceGraph::new();
        let s = g.add_vertex(Vertex::source_sink());
        let a = g.add_vertex(exon(1.667));
        let t = g.add_vertex(Vertex::source_sink());
        g.add_edge(Edge::new(s, a, 1.667));
        g.add_edge(Edge::new(a, t, 1.667));

        let cfg = Configuration::default();
        let d = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);
        let paths = d.decompose(g, 0).unwrap();
        assert_eq!(paths.len(), 1);
        assert!((paths[0].abundance() - 1.667).abs() < 1e-6);
        assert_eq!(paths[0].vertices(), &vec![s, a, t]);
    }

    #[test]
    fn s4_alternative_splicing_fork() {
        // source -> A -> B -> sink (weight 6), A -> C -> sink (weight 4)
        let mut g = SpliceGraph::new();
        let s = g.add_vertex(Vertex::source_sink());
        let a = g.add_vertex(exon(10.0));
        let b = g.add_vertex(exon(6.0));
        let c = g.add_vertex(exon(4.0));
        let t = g.add_vertex(Vertex::source_sink());
        g.add_edge(Edge::new(s, a, 10.0));
        g.add_edge(Edge::new(a, b, 6.0));
        g.add_edge(Edge::new(a, c, 4.0));
        g.add_edge(Edge::new(b, t, 6.0));
        g.add_edge(Edge::new(c, t, 4.0));

        let cfg = Configuration::default();
        let d = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);
        let mut paths = d.decompose(g, 0).unwrap();
        paths.sort_by(|p, q| q.abundance().partial_cmp(p.abundance()).unwrap());
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].vertices(), &vec![s, a, b, t]);
        assert!((paths[0].abundance() - 6.0).abs() < 1e-6);
        assert_eq!(paths[1].vertices(), &vec![s, a, c, t]);
        assert!((paths[1].abundance() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn bridge_impasse_falls_back_bridge_blind_and_tags_paths_unbridged() {
        // Two in-edges and two out-edges at `a`, each side phased to a distinct bridge id, but
        // with mismatched totals (10 in vs 6 out) so the bridge-respecting greedy pass fully
        // consumes one side without routing the other: an impasse that must retry bridge-blind.
        let mut g = SpliceGraph::new();
        let s = g.add_vertex(Vertex::source_sink());
        let p1 = g.add_vertex(exon(5.0));
        let p2 = g.add_vertex(exon(5.0));
        let a = g.add_vertex(exon(8.0));
        let q1 = g.add_vertex(exon(3.0));
        let q2 = g.add_vertex(exon(3.0));
        let t = g.add_vertex(Vertex::source_sink());
        g.add_edge(Edge::new(s, p1, 5.0));
        g.add_edge(Edge::new(s, p2, 5.0));
        g.add_edge(Edge::new(p1, a, 5.0).with_bridges(vec![1]));
        g.add_edge(Edge::new(p2, a, 5.0).with_bridges(vec![2]));
        g.add_edge(Edge::new(a, q1, 3.0).with_bridges(vec![1]));
        g.add_edge(Edge::new(a, q2, 3.0).with_bridges(vec![2]));
        g.add_edge(Edge::new(q1, t, 3.0));
        g.add_edge(Edge::new(q2, t, 3.0));

        let cfg = Configuration::default();
        let d = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);
        let paths = d.decompose(g, 0).unwrap();

        assert!(!paths.is_empty());
        assert!(
            paths.iter().any(|p| *p.unbridged()),
            "the bridge-blind fallback must mark its routed paths unbridged"
        );
        let total: f64 = paths.iter().map(|p| *p.abundance()).sum();
        assert!((total - 6.0).abs() < 1e-6, "total routed abundance was {}", total);
    }

    #[test]
    fn s5_bridge_constraint_keeps_paths_separate() {
        let mut g = SpliceGraph::new();
        let s = g.add_vertex(Vertex::source_sink());
        let a = g.add_vertex(exon(10.0));
        let b = g.add_vertex(exon(11.0));
        let c = g.add_vertex(exon(9.0));
        let t = g.add_vertex(Vertex::source_sink());
        g.add_edge(Edge::new(s, a, 10.0));
        // A->B carries two bridge ids: one for the 5 reads phased through to C, one for the 1
        // read that actually ends at B.
        g.add_edge(Edge::new(a, b, 6.0).with_bridges(vec![1, 2]));
        g.add_edge(Edge::new(a, c, 4.0));
        g.add_edge(Edge::new(b, c, 5.0).with_bridges(vec![1]));
        g.add_edge(Edge::new(b, t, 1.0).with_bridges(vec![2]));
        g.add_edge(Edge::new(c, t, 9.0));

        let cfg = Configuration::default();
        let d = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);
        let mut paths = d.decompose(g, 0).unwrap();
        paths.sort_by(|p, q| q.abundance().partial_cmp(p.abundance()).unwrap());

        // s-a-b-c-t=5, s-a-c-t=4, s-a-b-t=1: the only decomposition flow conservation on the
        // single source edge (weight 10.0) permits, with the bridge on a->b keeping the 5-read
        // phasing to c separate from the 1-read phasing that ends at b.
        assert_eq!(paths.len(), 3);
        let abundances: Vec<f64> = {
            let mut v: Vec<f64> = paths.iter().map(|p| *p.abundance()).collect();
            v.sort_by(|a, b| b.partial_cmp(a).unwrap());
            v
        };
        assert!((abundances[0] - 5.0).abs() < 1e-6);
        assert!((abundances[1] - 4.0).abs() < 1e-6);
        assert!((abundances[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn check_reconstruction_does_not_flag_an_exact_decomposition() {
        // a straightforward single-path graph should reproduce every edge weight exactly, so the
        // diagnostic pass has nothing to report and decompose() still returns normally.
        let mut g = SpliceGraph::new();
        let s = g.add_vertex(Vertex::source_sink());
        let a = g.add_vertex(exon(3.0));
        let t = g.add_vertex(Vertex::source_sink());
        g.add_edge(Edge::new(s, a, 3.0));
        g.add_edge(Edge::new(a, t, 3.0));

        let cfg = Configuration::default();
        let d = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);
        let paths = d.decompose(g, 0).unwrap();
        assert_eq!(paths.len(), 1);
        assert!((paths[0].abundance() - 3.0).abs() < 1e-6);
    }
}
