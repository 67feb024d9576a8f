use thiserror::Error;

/// The closed set of error conditions the engine can raise.
///
/// `InvalidInterval` and `MalformedCigar` are caller bugs and abort the offending operation.
/// `OutOfOrderHit` drops the hit with a diagnostic. `GraphNotAcyclic` is fatal for the bundle it
/// was raised on. `DecompositionInconsistent` and `IncompatibleBridge` are recoverable: callers may
/// continue with the decomposer's best-effort output, tagging affected paths.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum Error {
    #[error("invalid interval [{l}, {r}): l must be < r")]
    InvalidInterval { l: i32, r: i32 },

    #[error("hit at {pos} added out of order (bundle right end is already at {rpos})")]
    OutOfOrderHit { pos: i32, rpos: i32 },

    #[error("malformed cigar: {msg}")]
    MalformedCigar { msg: String },

    #[error("malformed example graph: {msg}")]
    MalformedExample { msg: String },

    #[error("splice graph for bundle {bundle_index} is not acyclic under the vertex-id topological order")]
    GraphNotAcyclic { bundle_index: usize },

    #[error(
        "decomposition of bundle {bundle_index} left a residual flow imbalance of {residual} \
         on edge ({from}, {to}), exceeding epsilon {epsilon}"
    )]
    DecompositionInconsistent {
        bundle_index: usize,
        from: usize,
        to: usize,
        residual: f64,
        epsilon: f64,
    },

    #[error(
        "bridge evidence at vertex {vertex} forbids every compatible in/out pairing (bridge ids: {bridge_ids:?})"
    )]
    IncompatibleBridge { vertex: usize, bridge_ids: Vec<u32> },

    #[error("invalid configuration: {msg}")]
    InvalidConfiguration { msg: String },
}

pub type Result<T> = std::result::Result<T, Error>;
