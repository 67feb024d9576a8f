//! Engine-wide tunables (`SPEC_FULL.md` §6). One immutable `Configuration` is built once by the
//! driver and threaded by reference through bundle construction, graph construction and
//! decomposition; nothing here is ever mutated after construction.

use derive_builder::Builder;
use getset::Getters;
use serde::Deserialize;

use crate::errors::Error;

/// All tunables the engine exposes, fully enumerated. See `SPEC_FULL.md` §6 for the effect of
/// each field.
#[derive(Debug, Clone, Builder, Getters)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
#[getset(get = "pub")]
pub struct Configuration {
    /// Minimum gap, in bp, between the end of the current bundle and the start of the next hit
    /// before a new bundle is started.
    #[builder(default = "100")]
    min_bundle_gap: i32,

    /// Closed bundles with fewer hits than this are discarded without being assembled.
    #[builder(default = "1")]
    min_num_hits_in_bundle: usize,

    /// `0` means unlimited; otherwise a hard cap on the number of bundles the driver will emit.
    #[builder(default = "0")]
    max_num_bundles: usize,

    /// A junction needs at least this much supporting evidence to become a splice-graph edge.
    #[builder(default = "1")]
    min_splice_boundary_hits: u32,

    /// Vertices whose reconciled weight falls below this are merged into a neighbour rather than
    /// kept as a degenerate near-zero-weight exon.
    #[builder(default = "0.0")]
    min_vertex_weight: f64,

    /// If `true`, a vertex whose bridge evidence forbids every in/out pairing is a hard error
    /// (`IncompatibleBridge`) instead of falling back to the bridge-blind greedy strategy.
    #[builder(default = "false")]
    decomposer_bridge_strict: bool,

    /// Flow-conservation tolerance used by the invariants in `SPEC_FULL.md` §8 and by the
    /// decomposer's own residual check.
    #[builder(default = "0.01")]
    reconciliation_epsilon: f64,

    /// Defensive cap on the active bundle's hit list (`SPEC_FULL.md` §5); exceeding it forces an
    /// early bundle close. `0` means unbounded.
    #[builder(default = "1_000_000")]
    max_hits_per_bundle: usize,
}

impl ConfigurationBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(gap) = self.min_bundle_gap {
            if gap <= 0 {
                return Err("min_bundle_gap must be positive".to_string());
            }
        }
        if let Some(eps) = self.reconciliation_epsilon {
            if !(0.0..=1.0).contains(&eps) {
                return Err("reconciliation_epsilon must be within [0, 1]".to_string());
            }
        }
        if let Some(w) = self.min_vertex_weight {
            if w < 0.0 {
                return Err("min_vertex_weight must be non-negative".to_string());
            }
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        ConfigurationBuilder::default()
            .build()
            .expect("default configuration must satisfy its own validation")
    }
}

/// Mirrors `Configuration` with every field optional, so a YAML document only needs to name the
/// tunables it wants to override; anything absent falls through to the builder's own default.
#[derive(Debug, Default, Deserialize)]
struct RawConfiguration {
    min_bundle_gap: Option<i32>,
    min_num_hits_in_bundle: Option<usize>,
    max_num_bundles: Option<usize>,
    min_splice_boundary_hits: Option<u32>,
    min_vertex_weight: Option<f64>,
    decomposer_bridge_strict: Option<bool>,
    reconciliation_epsilon: Option<f64>,
    max_hits_per_bundle: Option<usize>,
}

impl Configuration {
    /// Loads a `Configuration` from a YAML document, matching the reference crate's
    /// `grammar::Scenario` YAML-loading convention. Routed through `ConfigurationBuilder` so the
    /// same validation the programmatic builder path enforces (`SPEC_FULL.md` §7/S7) also applies
    /// here — a YAML file can never smuggle in a nonsensical tunable the builder would reject.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let raw: RawConfiguration = serde_yaml::from_str(yaml).map_err(|e| Error::InvalidConfiguration {
            msg: e.to_string(),
        })?;

        let mut builder = ConfigurationBuilder::default();
        if let Some(v) = raw.min_bundle_gap {
            builder = builder.min_bundle_gap(v);
        }
        if let Some(v) = raw.min_num_hits_in_bundle {
            builder = builder.min_num_hits_in_bundle(v);
        }
        if let Some(v) = raw.max_num_bundles {
            builder = builder.max_num_bundles(v);
        }
        if let Some(v) = raw.min_splice_boundary_hits {
            builder = builder.min_splice_boundary_hits(v);
        }
        if let Some(v) = raw.min_vertex_weight {
            builder = builder.min_vertex_weight(v);
        }
        if let Some(v) = raw.decomposer_bridge_strict {
            builder = builder.decomposer_bridge_strict(v);
        }
        if let Some(v) = raw.reconciliation_epsilon {
            builder = builder.reconciliation_epsilon(v);
        }
        if let Some(v) = raw.max_hits_per_bundle {
            builder = builder.max_hits_per_bundle(v);
        }

        builder.build().map_err(|e| Error::InvalidConfiguration { msg: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let cfg = Configuration::default();
        assert_eq!(*cfg.min_bundle_gap(), 100);
        assert!((*cfg.reconciliation_epsilon() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn s7_configuration_rejects_nonsense() {
        let err = ConfigurationBuilder::default().min_bundle_gap(0).build();
        assert!(err.is_err());

        let err = ConfigurationBuilder::default()
            .reconciliation_epsilon(1.5)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn from_yaml_rejects_nonsense_same_as_the_builder() {
        let err = Configuration::from_yaml("min_bundle_gap: 0\n");
        assert!(err.is_err());

        let err = Configuration::from_yaml("reconciliation_epsilon: 5.0\n");
        assert!(err.is_err());

        let cfg = Configuration::from_yaml("min_bundle_gap: 50\n").unwrap();
        assert_eq!(*cfg.min_bundle_gap(), 50);
        assert_eq!(*cfg.min_num_hits_in_bundle(), 1);
    }
}
