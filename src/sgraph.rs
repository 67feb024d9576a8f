//! The splice graph: a weighted DAG with a unique source (vertex 0) and sink (vertex `V-1`).
//! `SPEC_FULL.md` §3/§9 calls for index-based, pointer-free storage so vertex ids stay stable
//! while the decomposer works — implemented here as flat `Vec`s addressed by `usize`, not as a
//! `petgraph::Graph` (whose node-removal semantics would renumber vertices).

use getset::Getters;
use std::fmt;

pub type VertexId = usize;
pub type BridgeId = u32;

/// The kind of event that produced one side of a partial exon (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryType {
    StartOfTranscript,
    EndOfTranscript,
    LeftOfJunction,
    RightOfJunction,
    InternalBreakpoint,
    /// Used only for the synthetic source/sink vertices.
    SourceSink,
}

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Vertex {
    weight: f64,
    length: i32,
    stddev: f64,
    left_type: BoundaryType,
    right_type: BoundaryType,
}

impl Vertex {
    pub fn new(weight: f64, length: i32, stddev: f64, left_type: BoundaryType, right_type: BoundaryType) -> Self {
        Vertex {
            weight,
            length,
            stddev,
            left_type,
            right_type,
        }
    }

    pub fn source_sink() -> Self {
        Vertex::new(0.0, 0, 0.0, BoundaryType::SourceSink, BoundaryType::SourceSink)
    }
}

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Edge {
    from: VertexId,
    to: VertexId,
    #[getset(get = "pub", set = "pub")]
    weight: f64,
    bridges: Vec<BridgeId>,
}

impl Edge {
    pub fn new(from: VertexId, to: VertexId, weight: f64) -> Self {
        Edge {
            from,
            to,
            weight,
            bridges: Vec::new(),
        }
    }

    pub fn with_bridges(mut self, bridges: Vec<BridgeId>) -> Self {
        self.bridges = bridges;
        self
    }
}

/// A weighted DAG addressed by `0..num_vertices()`. Vertex `0` is always the source and
/// `num_vertices() - 1` is always the sink. Edges `(u, v)` always satisfy `u < v`.
#[derive(Debug, Clone, Default)]
pub struct SpliceGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    out_adj: Vec<Vec<usize>>,
    in_adj: Vec<Vec<usize>>,
}

impl SpliceGraph {
    pub fn new() -> Self {
        SpliceGraph::default()
    }

    pub fn source(&self) -> VertexId {
        0
    }

    pub fn sink(&self) -> VertexId {
        self.vertices.len() - 1
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, v: VertexId) -> &Vertex {
        &self.vertices[v]
    }

    pub fn is_internal(&self, v: VertexId) -> bool {
        v != self.source() && v != self.sink()
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        self.vertices.push(vertex);
        self.out_adj.push(Vec::new());
        self.in_adj.push(Vec::new());
        self.vertices.len() - 1
    }

    /// Adds an edge `(from, to)`; `from` must be `< to`, matching the invariant that edges only
    /// ever point forward in the topological (= vertex-id) order.
    pub fn add_edge(&mut self, edge: Edge) -> usize {
        debug_assert!(edge.from < edge.to, "splice graph edges must go forward in vertex-id order");
        let idx = self.edges.len();
        self.out_adj[edge.from].push(idx);
        self.in_adj[edge.to].push(idx);
        self.edges.push(edge);
        idx
    }

    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    pub fn edge_mut(&mut self, idx: usize) -> &mut Edge {
        &mut self.edges[idx]
    }

    /// Edge indices leaving `v`, ordered by destination vertex id (matches the decomposer's
    /// tie-break rule, `SPEC_FULL.md` §4.4).
    pub fn out_edges(&self, v: VertexId) -> Vec<usize> {
        let mut ids = self.out_adj[v].clone();
        ids.sort_by_key(|&e| self.edges[e].to);
        ids
    }

    /// Edge indices entering `v`, ordered by source vertex id.
    pub fn in_edges(&self, v: VertexId) -> Vec<usize> {
        let mut ids = self.in_adj[v].clone();
        ids.sort_by_key(|&e| self.edges[e].from);
        ids
    }

    pub fn degree(&self, v: VertexId) -> usize {
        self.in_adj[v].len() + self.out_adj[v].len()
    }

    pub fn in_weight(&self, v: VertexId) -> f64 {
        self.in_adj[v].iter().map(|&e| self.edges[e].weight).sum()
    }

    pub fn out_weight(&self, v: VertexId) -> f64 {
        self.out_adj[v].iter().map(|&e| self.edges[e].weight).sum()
    }

    /// All `(from, to)` pairs, in `(from, to)` order, matching the deterministic edge ordering
    /// the decomposer relies on.
    pub fn edges_ordered(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..self.edges.len()).collect();
        ids.sort_by_key(|&e| (self.edges[e].from, self.edges[e].to));
        ids
    }

    /// `true` if every internal vertex's in-weight and out-weight agree within `epsilon` of the
    /// larger of the two (invariant 2, `SPEC_FULL.md` §8). Vertices with no incident edges at all
    /// trivially satisfy the check.
    pub fn is_flow_conserving(&self, epsilon: f64) -> bool {
        (1..self.sink()).all(|v| {
            let (win, wout) = (self.in_weight(v), self.out_weight(v));
            win == wout || approx::relative_eq!(win, wout, max_relative = epsilon.max(1e-12))
        })
    }
}

impl fmt::Display for SpliceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "splice graph: {} vertices, {} edges",
            self.num_vertices(),
            self.num_edges()
        )
    }
}
