//! Splice-graph construction and flow decomposition for transcript assembly from spliced
//! alignments (`SPEC_FULL.md`). Given a set of spliced alignments within one genomic locus, this
//! crate builds a weighted splice graph from their coverage and junction evidence and decomposes
//! it into a minimum-weight set of source→sink paths whose flows reproduce the graph's edge
//! weights — the "scallop" algorithm — alongside a simpler heaviest-path baseline behind the same
//! `Decomposer` trait.
//!
//! Alignment-file parsing, the GTF grammar, graph-drawing output and full CLI argument handling
//! are treated as external collaborators; this crate only fixes the post-parse shapes they hand
//! off (`hit::Hit`, `annotation::AnnotationRecord`).

pub mod analyzer;
pub mod annotation;
pub mod bundle;
pub mod cli;
pub mod config;
pub mod decomposer;
pub mod driver;
pub mod errors;
pub mod example;
pub mod hit;
pub mod imap;
pub mod sgraph;
pub mod textio;

pub use config::{Configuration, ConfigurationBuilder};
pub use decomposer::{Decomposer, DecomposerKind, Path};
pub use driver::{AssemblerDriver, TranscriptRecord};
pub use errors::{Error, Result};
pub use hit::Hit;
pub use sgraph::SpliceGraph;
