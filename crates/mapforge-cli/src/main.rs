//! Mapforge CLI
//!
//! Command-line interface for:
//! - Running declarative assembly pipelines (`assemble`)
//! - Summarizing mapping files (`stats`)
//! - Converting between the tabular and archive formats (`convert`)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use mapforge_core::ops::count_source_target;
use mapforge_core::{CancelToken, Mapping, StaticTermCatalog, TermCatalog};
use mapforge_io::{archive, cache, sssom, AdapterRegistry, IngestMode};
use mapforge_pipeline::{driver, load_configuration};

#[derive(Parser)]
#[command(name = "mapforge")]
#[command(
    author,
    version,
    about = "Assemble, reason over, and prioritize semantic mappings"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an assembly configuration end to end.
    Assemble {
        /// Path to the configuration JSON document.
        config: PathBuf,
        /// Directory against which relative input/output paths resolve.
        /// Defaults to the configuration file's directory.
        #[arg(long)]
        data_root: Option<PathBuf>,
        /// Optional JSON object of per-prefix term counts; enables the
        /// landscape stage.
        #[arg(long)]
        terms: Option<PathBuf>,
    },

    /// Summarize a mapping file by source/target prefix pair.
    Stats {
        /// A `.tsv`, `.jsonl`, or `.cache` mapping file.
        input: PathBuf,
        /// Hide pairs with at most this many mappings.
        #[arg(long, default_value_t = 0)]
        min_count: usize,
    },

    /// Convert a mapping file between formats (by extension).
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Assemble {
            config,
            data_root,
            terms,
        } => assemble(&config, data_root, terms),
        Commands::Stats { input, min_count } => stats(&input, min_count),
        Commands::Convert { input, output } => convert(&input, &output),
    }
}

fn assemble(config_path: &Path, data_root: Option<PathBuf>, terms: Option<PathBuf>) -> Result<()> {
    let configuration = load_configuration(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let data_root = match data_root {
        Some(root) => root,
        None => config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let mode = if configuration.strict {
        IngestMode::Strict
    } else {
        IngestMode::Lenient
    };
    let registry = AdapterRegistry::with_builtins_mode(&data_root, mode);

    let catalog = match terms {
        Some(path) => {
            let text =
                fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let counts: HashMap<String, u64> = serde_json::from_str(&text)?;
            Some(counts.into_iter().collect::<StaticTermCatalog>())
        }
        None => None,
    };

    let result = driver::run(
        &configuration,
        &registry,
        catalog.as_ref().map(|catalog| catalog as &dyn TermCatalog),
        &data_root,
        CancelToken::new(),
    )?;

    println!("{} {}", "assembled".green().bold(), configuration.name);
    println!("  raw:       {}", result.raw.len());
    println!("  processed: {}", result.processed.len());
    println!("  priority:  {}", result.priority.len());
    if !result.reached_fixed_point {
        println!(
            "  {} inference stopped after {} rounds before closure",
            "note:".yellow(),
            result.inference_rounds
        );
    }
    if let Some(landscape) = &result.landscape {
        println!();
        println!("{}", landscape.describe());
    }
    Ok(())
}

fn stats(input: &Path, min_count: usize) -> Result<()> {
    let mappings = read_any(input)?;
    println!(
        "{} {} mappings in {}",
        "loaded".green().bold(),
        mappings.len(),
        input.display()
    );
    let counts = count_source_target(&mappings);
    println!("{:<20} {:<20} {:>10}", "source".bold(), "target".bold(), "count".bold());
    for ((source, target), count) in counts {
        if count <= min_count {
            continue;
        }
        println!("{source:<20} {target:<20} {count:>10}");
    }
    Ok(())
}

fn convert(input: &Path, output: &Path) -> Result<()> {
    let mappings = read_any(input)?;
    write_any(&mappings, output)?;
    println!(
        "{} {} mappings: {} -> {}",
        "converted".green().bold(),
        mappings.len(),
        input.display(),
        output.display()
    );
    Ok(())
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|ext| ext.to_str()).unwrap_or("")
}

fn read_any(path: &Path) -> Result<Vec<Mapping>> {
    let mappings = match extension(path) {
        "tsv" => sssom::read_sssom(path, IngestMode::Lenient)?,
        "jsonl" => archive::read_archive(path)?,
        "cache" => cache::read_cache(path)?,
        other => bail!("unsupported input extension {other:?} (expected tsv, jsonl, or cache)"),
    };
    Ok(mappings)
}

fn write_any(mappings: &[Mapping], path: &Path) -> Result<()> {
    match extension(path) {
        "tsv" => sssom::write_sssom(mappings, path)?,
        "jsonl" => archive::write_archive(mappings, path)?,
        "cache" => cache::write_cache(mappings, path)?,
        other => bail!("unsupported output extension {other:?} (expected tsv, jsonl, or cache)"),
    }
    Ok(())
}
