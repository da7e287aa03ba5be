//! dumpdiff CLI
//!
//! Builds fingerprint stores from full dumps and diffs later dumps against
//! them. Errors print a diagnostic chain to stderr and exit non-zero; the
//! store file is only rewritten after a fully successful run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dumpdiff::{
    DatasetKind, DiffEngine, FingerprintStore, StreamExtractor, build, validate_stream_date,
};

#[derive(Parser)]
#[command(name = "dumpdiff")]
#[command(version)]
#[command(about = "Streaming fingerprint diff for huge tag-delimited XML dumps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fingerprint store from a full dump
    Build {
        /// The dump to fingerprint
        #[arg(short = 'f', long)]
        xml_file: PathBuf,
        /// Release date of the dump (YYYYMMDD)
        #[arg(short = 'e', long)]
        date: u32,
        /// Dataset kind of the dump
        #[arg(short = 't', long, value_enum)]
        kind: KindArg,
        /// The store file to write
        #[arg(short = 'd', long)]
        store: PathBuf,
    },
    /// Diff a sample dump against its store
    Sample {
        /// The sample dump to compare
        #[arg(short = 'f', long)]
        xml_file: PathBuf,
        /// Release date of the dump (YYYYMMDD)
        #[arg(short = 'e', long)]
        date: u32,
        /// The sample store file
        #[arg(short = 'd', long)]
        store: PathBuf,
        /// Directory for the changeset body and status list
        #[arg(short = 'o', long)]
        output_dir: PathBuf,
    },
    /// Diff a project dump against its store
    Project {
        /// The project dump to compare
        #[arg(short = 'f', long)]
        xml_file: PathBuf,
        /// Release date of the dump (YYYYMMDD)
        #[arg(short = 'e', long)]
        date: u32,
        /// The project store file
        #[arg(short = 'd', long)]
        store: PathBuf,
        /// Directory for the changeset body and status list
        #[arg(short = 'o', long)]
        output_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Sample,
    Project,
}

impl From<KindArg> for DatasetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Sample => DatasetKind::Sample,
            KindArg::Project => DatasetKind::Project,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            xml_file,
            date,
            kind,
            store,
        } => run_build(kind.into(), &xml_file, date, &store),
        Commands::Sample {
            xml_file,
            date,
            store,
            output_dir,
        } => run_diff(DatasetKind::Sample, &xml_file, date, &store, &output_dir),
        Commands::Project {
            xml_file,
            date,
            store,
            output_dir,
        } => run_diff(DatasetKind::Project, &xml_file, date, &store, &output_dir),
    }
}

fn run_build(kind: DatasetKind, xml_file: &Path, date: u32, store_path: &Path) -> Result<()> {
    validate_stream_date(date)?;

    let source = File::open(xml_file)
        .with_context(|| format!("failed to open dump {}", xml_file.display()))?;
    let mut extractor = StreamExtractor::new(source, kind.extract_config()?);
    let mut store = FingerprintStore::new(kind, date, kind.initial_capacity());

    let records = build(&mut extractor, &mut store)?;

    store
        .save(store_path)
        .with_context(|| format!("failed to write store {}", store_path.display()))?;
    info!(records, store = %store_path.display(), "store saved");
    Ok(())
}

fn run_diff(
    kind: DatasetKind,
    xml_file: &Path,
    date: u32,
    store_path: &Path,
    output_dir: &Path,
) -> Result<()> {
    validate_stream_date(date)?;

    let store = FingerprintStore::load(store_path)
        .with_context(|| format!("failed to load store {}", store_path.display()))?;
    let mut engine = DiffEngine::open(store, kind, date)?;

    let source = File::open(xml_file)
        .with_context(|| format!("failed to open dump {}", xml_file.display()))?;
    let mut extractor = StreamExtractor::new(source, kind.extract_config()?);

    let body_path = output_dir.join(format!("{}_diff.xml", kind.label()));
    let mut body = BufWriter::new(
        File::create(&body_path)
            .with_context(|| format!("failed to create {}", body_path.display()))?,
    );
    let records = engine.compare(&mut extractor, &mut body)?;
    body.flush()?;

    let list_path = output_dir.join(format!("{}_diff.list", kind.label()));
    let list = File::create(&list_path)
        .with_context(|| format!("failed to create {}", list_path.display()))?;
    let summary = engine.write_status(BufWriter::new(list))?;

    engine
        .commit_and_save(store_path)
        .with_context(|| format!("failed to rewrite store {}", store_path.display()))?;

    info!(
        records,
        added = summary.added,
        changed = summary.changed,
        deleted = summary.deleted,
        "diff committed"
    );
    Ok(())
}
