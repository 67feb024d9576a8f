//! Parses the pinned textual graph description used for test scaffolding (`SPEC_FULL.md` §6): one
//! line per vertex (`v <id> <weight> <length>`), one line per edge (`e <from> <to> <weight>`),
//! blank lines and `#` comments ignored. Vertex `0` is always the source and the highest id is
//! always the sink, matching the reference manager's own test-graph file convention.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{Error, Result};
use crate::sgraph::{BoundaryType, Edge, SpliceGraph, Vertex};

lazy_static! {
    static ref VERTEX_RE: Regex =
        Regex::new(r"^v\s+(?P<id>\d+)\s+(?P<w>[0-9.eE+-]+)\s+(?P<len>\d+)\s*$").unwrap();
    static ref EDGE_RE: Regex =
        Regex::new(r"^e\s+(?P<from>\d+)\s+(?P<to>\d+)\s+(?P<w>[0-9.eE+-]+)\s*$").unwrap();
}

/// Parses `text` into a `SpliceGraph`. Vertices must be listed in increasing id order starting
/// from `0`; edges may follow in any order but each `from` must already have been declared.
pub fn parse_example_graph(text: &str) -> Result<SpliceGraph> {
    let mut g = SpliceGraph::new();
    let mut next_id = 0usize;
    let mut pending_edges: Vec<(usize, usize, f64)> = Vec::new();

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = VERTEX_RE.captures(line) {
            let id: usize = caps["id"].parse().unwrap();
            if id != next_id {
                return Err(malformed(lineno, "vertex ids must be declared in increasing order from 0"));
            }
            let weight: f64 = caps["w"].parse().unwrap();
            let length: i32 = caps["len"].parse().unwrap();
            let (left, right) = if id == 0 {
                (BoundaryType::SourceSink, BoundaryType::SourceSink)
            } else {
                (BoundaryType::LeftOfJunction, BoundaryType::RightOfJunction)
            };
            g.add_vertex(Vertex::new(weight, length, 0.0, left, right));
            next_id += 1;
        } else if let Some(caps) = EDGE_RE.captures(line) {
            let from: usize = caps["from"].parse().unwrap();
            let to: usize = caps["to"].parse().unwrap();
            let weight: f64 = caps["w"].parse().unwrap();
            pending_edges.push((from, to, weight));
        } else {
            return Err(malformed(lineno, "line matches neither a vertex nor an edge"));
        }
    }

    for (from, to, weight) in pending_edges {
        if from >= next_id || to >= next_id {
            return Err(Error::MalformedExample {
                msg: format!("edge ({}, {}) references an undeclared vertex", from, to),
            });
        }
        g.add_edge(Edge::new(from, to, weight));
    }

    Ok(g)
}

fn malformed(lineno: usize, msg: &str) -> Error {
    Error::MalformedExample {
        msg: format!("example graph line {}: {}", lineno + 1, msg),
    }
}
