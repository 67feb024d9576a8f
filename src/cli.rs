//! The driving CLI exposed by the `scallop-asm` binary. Real BAM/CRAM decoding and the GTF grammar
//! stay external collaborators' concerns (`SPEC_FULL.md` §1); each subcommand here reads a pinned,
//! self-contained text format instead (`textio`, `example`) so the engine's three real entry points
//! — hit stream, annotation stream, and test-scaffolding graph — can all be driven for manual and ad
//! hoc runs without needing those collaborators.

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use bio_types::strand::Strand;
use structopt::StructOpt;

use crate::config::Configuration;
use crate::decomposer::scallop::{ScallopDecomposer, ScallopStrategy};
use crate::decomposer::stringtie::StringtieDecomposer;
use crate::decomposer::Decomposer;
use crate::driver::AssemblerDriver;
use crate::example::parse_example_graph;
use crate::textio::{parse_annotation_lines, parse_hit_lines};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "scallop-asm",
    about = "Splice-graph construction and flow decomposition for transcript assembly.",
    setting = structopt::clap::AppSettings::ColoredHelp,
)]
pub struct Cli {
    #[structopt(subcommand)]
    pub cmd: Command,

    /// Increase log verbosity (`-v` debug, `-vv` trace); default is info.
    #[structopt(short, long, parse(from_occurrences), global = true)]
    pub verbose: u8,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Parse a graph in the pinned textual example format and decompose it.
    Example {
        /// Path to a `v <id> <w> <len>` / `e <from> <to> <w>` graph description.
        #[structopt(parse(from_os_str))]
        path: PathBuf,

        /// Which `Decomposer` to run: `scallop1`, `scallop2`, or `stringtie`.
        #[structopt(long, default_value = "scallop2")]
        decomposer: DecomposerChoice,

        /// Optional YAML configuration overriding the defaults in `SPEC_FULL.md` §6.
        #[structopt(long, parse(from_os_str))]
        config: Option<PathBuf>,
    },

    /// Bundle and assemble a pinned textual hit stream (mirrors the real `assemble-bam` path,
    /// minus the BAM/CRAM decoding itself).
    Hits {
        /// Path to an `<id> <ref_id> <pos> <cigar> <strand> <mapq>` hit listing.
        #[structopt(parse(from_os_str))]
        path: PathBuf,

        #[structopt(long, default_value = "scallop2")]
        decomposer: DecomposerChoice,

        #[structopt(long, parse(from_os_str))]
        config: Option<PathBuf>,
    },

    /// Assemble directly from a pinned textual annotation listing (mirrors the real
    /// `assemble-gtf` path, minus the GTF grammar itself).
    Annotation {
        /// Path to a `<gene_id> <transcript_id> <feature> <exon_start> <exon_end> <strand>` listing.
        #[structopt(parse(from_os_str))]
        path: PathBuf,

        #[structopt(long, default_value = "scallop2")]
        decomposer: DecomposerChoice,

        #[structopt(long, parse(from_os_str))]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum DecomposerChoice {
    Scallop1,
    Scallop2,
    Stringtie,
}

impl FromStr for DecomposerChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scallop1" => Ok(DecomposerChoice::Scallop1),
            "scallop2" => Ok(DecomposerChoice::Scallop2),
            "stringtie" => Ok(DecomposerChoice::Stringtie),
            other => Err(anyhow::anyhow!("unknown decomposer '{}' (expected scallop1, scallop2, or stringtie)", other)),
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.cmd {
        Command::Example { path, decomposer, config } => run_example(&path, decomposer, config.as_deref()),
        Command::Hits { path, decomposer, config } => run_hits(&path, decomposer, config.as_deref()),
        Command::Annotation { path, decomposer, config } => run_annotation(&path, decomposer, config.as_deref()),
    }
}

fn load_configuration(config_path: Option<&std::path::Path>) -> Result<Configuration> {
    match config_path {
        Some(p) => {
            let yaml = fs::read_to_string(p).with_context(|| format!("reading configuration {}", p.display()))?;
            Ok(Configuration::from_yaml(&yaml)?)
        }
        None => Ok(Configuration::default()),
    }
}

fn build_decomposer(choice: DecomposerChoice, config: &Configuration) -> Box<dyn Decomposer> {
    match choice {
        DecomposerChoice::Scallop1 => Box::new(ScallopDecomposer::new(ScallopStrategy::Scallop1, config)),
        DecomposerChoice::Scallop2 => Box::new(ScallopDecomposer::new(ScallopStrategy::Scallop2, config)),
        DecomposerChoice::Stringtie => Box::new(StringtieDecomposer::new()),
    }
}

fn run_hits(path: &std::path::Path, choice: DecomposerChoice, config_path: Option<&std::path::Path>) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading hit listing {}", path.display()))?;
    let hits = parse_hit_lines(&text).context("parsing hit listing")?;
    let config = load_configuration(config_path)?;
    let decomposer = build_decomposer(choice, &config);

    let driver = AssemblerDriver::new(config);
    let records = driver.run(hits, decomposer.as_ref(), Strand::Unknown);
    for record in &records {
        print_transcript(record.bundle_index(), record.exons(), *record.abundance(), *record.unbridged());
    }
    Ok(())
}

fn run_annotation(path: &std::path::Path, choice: DecomposerChoice, config_path: Option<&std::path::Path>) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading annotation listing {}", path.display()))?;
    let records = parse_annotation_lines(&text).context("parsing annotation listing")?;
    let config = load_configuration(config_path)?;
    let decomposer = build_decomposer(choice, &config);

    let driver = AssemblerDriver::new(config);
    let out = driver.run_from_annotation(records, decomposer.as_ref());
    for record in &out {
        print_transcript(record.bundle_index(), record.exons(), *record.abundance(), *record.unbridged());
    }
    Ok(())
}

fn print_transcript(bundle_index: &usize, exons: &[(i32, i32)], abundance: f64, unbridged: bool) {
    let exon_str: Vec<String> = exons.iter().map(|(a, b)| format!("{}-{}", a, b)).collect();
    println!(
        "bundle={}\texons={}\tabundance={:.6}\tunbridged={}",
        bundle_index,
        exon_str.join(","),
        abundance,
        unbridged
    );
}

fn run_example(path: &std::path::Path, choice: DecomposerChoice, config_path: Option<&std::path::Path>) -> Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading example graph {}", path.display()))?;
    let graph = parse_example_graph(&text).context("parsing example graph")?;

    let config = load_configuration(config_path)?;
    let decomposer = build_decomposer(choice, &config);

    log::info!(
        "decomposing {} ({} vertices, {} edges) with {:?}",
        path.display(),
        graph.num_vertices(),
        graph.num_edges(),
        choice
    );

    let paths = decomposer.decompose(graph, 0)?;
    for path in &paths {
        let verts: Vec<String> = path.vertices().iter().map(|v| v.to_string()).collect();
        println!(
            "path\t{}\tabundance={:.6}\tunbridged={}",
            verts.join(","),
            path.abundance(),
            path.unbridged()
        );
    }
    Ok(())
}
