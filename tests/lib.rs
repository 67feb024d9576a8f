//! End-to-end exercises of the public API against `SPEC_FULL.md` §8's scenarios and invariants,
//! run through the crate's own types rather than any external alignment/GTF reader.

use approx::assert_relative_eq;
use bio_types::strand::Strand;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_htslib::bam::record::{Cigar, CigarString};

use scallop_asm::analyzer::{classify, compute_connected_components, compute_num_paths, decide_nested, GraphClass};
use scallop_asm::annotation::{build_splice_graph_from_annotation, AnnotationRecord};
use scallop_asm::bundle::Bundle;
use scallop_asm::config::{Configuration, ConfigurationBuilder};
use scallop_asm::decomposer::scallop::{ScallopDecomposer, ScallopStrategy};
use scallop_asm::decomposer::stringtie::StringtieDecomposer;
use scallop_asm::decomposer::Decomposer;
use scallop_asm::driver::AssemblerDriver;
use scallop_asm::example::parse_example_graph;
use scallop_asm::hit::Hit;
use scallop_asm::imap::IntervalMap;
use std::io::Write;
use structopt::StructOpt;

fn hit(id: &str, ref_id: i32, pos: i32, ops: &[Cigar]) -> Hit {
    Hit::new(id, ref_id, pos, CigarString(ops.to_vec()), Strand::Forward, 60)
}

#[test]
fn s1_interval_map_scenario() {
    let mut m = IntervalMap::new();
    m.add(1, 3, 3).unwrap();
    m.add(1, 2, 1).unwrap();
    m.add(2, 5, 2).unwrap();
    m.add(6, 7, 3).unwrap();
    m.split_at(4);

    let entries: Vec<_> = m.iter().collect();
    assert_eq!(entries, vec![(1..2, 4), (2..3, 5), (3..4, 2), (4..5, 2), (6..7, 3)]);
    assert_eq!(m.coverage_at(5), 0);

    let (lit, rit) = m.boundary(0, 8);
    assert_eq!(m.coverage_sum(lit, rit), 16);
}

#[test]
fn s2_linear_bundle_through_the_driver() {
    let cfg = Configuration::default();
    let driver = AssemblerDriver::new(cfg.clone());
    let decomposer = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);

    let hits: Vec<Hit> = [1000, 1050, 1100, 1150, 1200]
        .into_iter()
        .enumerate()
        .map(|(i, start)| hit(&format!("r{}", i), 0, start, &[Cigar::Match(100)]))
        .collect();

    let records = driver.run(hits, &decomposer, Strand::Forward);
    assert_eq!(records.len(), 1);
    assert_relative_eq!(*records[0].abundance(), 5.0 * 100.0 / 300.0, epsilon = 1e-6);
    assert_eq!(records[0].exons(), &vec![(1000, 1300)]);
}

#[test]
fn s3_two_exon_junction_through_the_driver() {
    let cfg = Configuration::default();
    let driver = AssemblerDriver::new(cfg.clone());
    let decomposer = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);

    let hits: Vec<Hit> = (0..10)
        .map(|i| hit(&format!("r{}", i), 0, 100, &[Cigar::Match(50), Cigar::RefSkip(100), Cigar::Match(50)]))
        .collect();

    let records = driver.run(hits, &decomposer, Strand::Forward);
    assert_eq!(records.len(), 1);
    assert_relative_eq!(*records[0].abundance(), 10.0, epsilon = 1e-6);
    assert_eq!(records[0].exons(), &vec![(100, 150), (250, 300)]);
}

#[test]
fn s4_alternative_splicing_fork_via_bundle() {
    // exon A [100,200), forking to B [300,400) (6 reads) and C [500,600) (4 reads).
    let cfg = Configuration::default();
    let mut bundle = Bundle::new(0);
    for i in 0..6 {
        bundle
            .add_hit(hit(
                &format!("ab{}", i),
                0,
                100,
                &[Cigar::Match(100), Cigar::RefSkip(200), Cigar::Match(100)],
            ))
            .unwrap();
    }
    for i in 0..4 {
        bundle
            .add_hit(hit(
                &format!("ac{}", i),
                0,
                100,
                &[Cigar::Match(100), Cigar::RefSkip(400), Cigar::Match(100)],
            ))
            .unwrap();
    }
    let (graph, _exons) = bundle.build_splice_graph(&cfg, 0).unwrap();
    assert!(graph.is_flow_conserving(*cfg.reconciliation_epsilon()));

    let decomposer = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);
    let mut paths = decomposer.decompose(graph, 0).unwrap();
    paths.sort_by(|p, q| q.abundance().partial_cmp(p.abundance()).unwrap());
    assert_eq!(paths.len(), 2);
    assert_relative_eq!(*paths[0].abundance(), 6.0, epsilon = 1e-6);
    assert_relative_eq!(*paths[1].abundance(), 4.0, epsilon = 1e-6);
}

#[test]
fn s6_nested_vs_crossing_classification() {
    let text_nested = "\
        v 0 0 0\nv 1 1 1\nv 2 1 1\nv 3 1 1\nv 4 1 1\nv 5 1 1\n\
        e 0 1 1\ne 1 2 1\ne 2 3 1\ne 3 4 1\ne 4 5 1\ne 1 4 1\n";
    let g = parse_example_graph(text_nested).unwrap();
    assert!(decide_nested(&g));

    let text_crossing = "\
        v 0 0 0\nv 1 1 1\nv 2 1 1\nv 3 1 1\nv 4 1 1\nv 5 1 1\n\
        e 0 1 1\ne 1 2 1\ne 2 3 1\ne 3 4 1\ne 4 5 1\ne 1 4 1\ne 2 5 1\n";
    let g2 = parse_example_graph(text_crossing).unwrap();
    assert!(!decide_nested(&g2));
}

#[test]
fn s7_configuration_rejects_nonsense() {
    assert!(ConfigurationBuilder::default().min_bundle_gap(0).build().is_err());
    assert!(ConfigurationBuilder::default().reconciliation_epsilon(2.0).build().is_err());
    assert!(ConfigurationBuilder::default().min_vertex_weight(-1.0).build().is_err());
}

#[test]
fn s8_annotation_path_parity_with_s3() {
    let records = vec![
        AnnotationRecord::new("geneA", "tx1", "exon", 100, 150, Strand::Forward),
        AnnotationRecord::new("geneA", "tx1", "exon", 250, 300, Strand::Forward),
    ];
    let graphs = build_splice_graph_from_annotation(records);
    assert_eq!(graphs.len(), 1);
    let (_, graph, spans) = &graphs[0];
    assert_eq!(graph.num_vertices(), 4);
    assert_eq!(graph.num_edges(), 3);
    assert_eq!(spans.len(), 2);
}

#[test]
fn example_graph_round_trips_through_both_decomposers() {
    let text = "\
        v 0 0 0\n\
        v 1 10 10\n\
        v 2 6 10\n\
        v 3 4 10\n\
        v 4 0 0\n\
        e 0 1 10\n\
        e 1 2 6\n\
        e 1 3 4\n\
        e 2 4 6\n\
        e 3 4 4\n";
    let decomposers: Vec<Box<dyn Decomposer>> = vec![
        Box::new(ScallopDecomposer::new(ScallopStrategy::Scallop2, &Configuration::default())),
        Box::new(StringtieDecomposer::new()),
    ];
    for decomposer in decomposers {
        let g = parse_example_graph(text).unwrap();
        let total_in: f64 = g.out_weight(g.source());
        let paths = decomposer.decompose(g, 0).unwrap();
        let total_out: f64 = paths.iter().map(|p| *p.abundance()).sum();
        assert_relative_eq!(total_in, total_out, epsilon = 1e-6);
    }
}

#[test]
fn cli_example_subcommand_drives_the_engine_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "v 0 0 0\nv 1 1.667 300\nv 2 0 0\ne 0 1 1.667\ne 1 2 1.667").unwrap();

    let cli = scallop_asm::cli::Cli::from_iter_safe(&[
        "scallop-asm",
        "example",
        file.path().to_str().unwrap(),
        "--decomposer",
        "stringtie",
    ])
    .unwrap();
    scallop_asm::cli::run(cli).unwrap();
}

#[test]
fn cli_hits_subcommand_drives_the_hit_stream_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..10 {
        writeln!(file, "r{} 0 100 50M100N50M + 60", i).unwrap();
    }

    let cli = scallop_asm::cli::Cli::from_iter_safe(&[
        "scallop-asm",
        "hits",
        file.path().to_str().unwrap(),
    ])
    .unwrap();
    scallop_asm::cli::run(cli).unwrap();
}

#[test]
fn cli_annotation_subcommand_drives_the_annotation_stream_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "geneA tx1 exon 100 150 +").unwrap();
    writeln!(file, "geneA tx1 exon 250 300 +").unwrap();

    let cli = scallop_asm::cli::Cli::from_iter_safe(&[
        "scallop-asm",
        "annotation",
        file.path().to_str().unwrap(),
        "--decomposer",
        "scallop2",
    ])
    .unwrap();
    scallop_asm::cli::run(cli).unwrap();
}

#[test]
fn graph_analyzer_invariants_hold_on_random_linear_bundles() {
    let mut rng = StdRng::seed_from_u64(42);
    let cfg = Configuration::default();

    for _ in 0..20 {
        let mut bundle = Bundle::new(0);
        let n_hits = rng.gen_range(1..8);
        let mut pos = 0;
        for i in 0..n_hits {
            pos += rng.gen_range(0..30);
            let len = rng.gen_range(20..80);
            bundle.add_hit(hit(&format!("r{}", i), 0, pos, &[Cigar::Match(len)])).unwrap();
        }
        let (graph, _exons) = bundle.build_splice_graph(&cfg, 0).unwrap();

        // invariant 4: compute_num_paths is always >= E - V + 2.
        let paths = compute_num_paths(&graph) as i64;
        let lower_bound = graph.num_edges() as i64 - graph.num_vertices() as i64 + 2;
        assert!(paths >= lower_bound);
        if paths == lower_bound {
            assert_eq!(classify(&graph), GraphClass::Easy);
        }

        // invariant 5: connected components partition the vertex set exactly once.
        let components = compute_connected_components(&graph, true);
        let mut seen: Vec<usize> = components.into_iter().flatten().collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), graph.num_vertices());

        // invariant 2: flow conservation holds after reconciliation.
        assert!(graph.is_flow_conserving(*cfg.reconciliation_epsilon()));

        // invariant 3: decomposed path abundances reproduce every edge's weight.
        let edges_before: Vec<(usize, usize, f64)> = (0..graph.num_edges())
            .map(|e| {
                let edge = graph.edge(e);
                (*edge.from(), *edge.to(), *edge.weight())
            })
            .collect();
        let decomposer = ScallopDecomposer::new(ScallopStrategy::Scallop2, &cfg);
        let paths = decomposer.decompose(graph, 0).unwrap();
        let epsilon = (*cfg.reconciliation_epsilon()).max(1e-6);
        for &(from, to, weight) in &edges_before {
            let routed: f64 = paths
                .iter()
                .filter(|p| p.vertices().windows(2).any(|w| w[0] == from && w[1] == to))
                .map(|p| *p.abundance())
                .sum();
            assert!(
                (weight - routed).abs() <= epsilon * weight.max(1.0),
                "edge ({}, {}) weight {} not reproduced by routed abundance {}",
                from,
                to,
                weight,
                routed
            );
        }
    }
}
