//! Flow decomposition: turning a reconciled splice graph into a set of source→sink paths whose
//! abundances reproduce its edge weights (`SPEC_FULL.md` §4.4).

pub mod scallop;
pub mod stringtie;

use getset::Getters;
use strum_macros::{Display, EnumString};

use crate::errors::Result;
use crate::sgraph::{BridgeId, SpliceGraph, VertexId};

/// Which `Decomposer` produced a given `Path`, carried through to the emitted transcript record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum DecomposerKind {
    Scallop,
    Stringtie,
}

/// A source-to-sink sequence of vertex indices with an associated abundance.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Path {
    vertices: Vec<VertexId>,
    abundance: f64,
    kind: DecomposerKind,
    /// Set when some vertex along this path had its bridge evidence overridden by the
    /// bridge-ignoring fallback strategy (`SPEC_FULL.md` §4.4 "Failure modes").
    unbridged: bool,
    /// Paired-junction identifiers that corroborate this path, accumulated from the edges fused
    /// during decomposition.
    bridges: Vec<BridgeId>,
}

impl Path {
    pub fn new(vertices: Vec<VertexId>, abundance: f64, kind: DecomposerKind) -> Self {
        Path {
            vertices,
            abundance,
            kind,
            unbridged: false,
            bridges: Vec::new(),
        }
    }

    pub fn with_unbridged(mut self, unbridged: bool) -> Self {
        self.unbridged = unbridged;
        self
    }

    pub fn with_bridges(mut self, bridges: Vec<BridgeId>) -> Self {
        self.bridges = bridges;
        self
    }

    pub fn source(&self) -> VertexId {
        self.vertices[0]
    }

    pub fn sink(&self) -> VertexId {
        *self.vertices.last().expect("a path always has at least source and sink")
    }
}

/// Capability implemented by every flow-decomposition strategy. `SpliceGraph` is taken by value
/// since every implementation works on a private, consumable copy (`SPEC_FULL.md` §4.4 "State").
pub trait Decomposer {
    fn kind(&self) -> DecomposerKind;

    /// Decomposes `graph` into a set of source→sink paths. `bundle_index` is only used to label
    /// diagnostics raised along the way.
    fn decompose(&self, graph: SpliceGraph, bundle_index: usize) -> Result<Vec<Path>>;
}
