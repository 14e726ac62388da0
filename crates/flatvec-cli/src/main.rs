//! FlatVec command line: chunk text files into record stores, build a dense
//! index over them, and search it.

mod chunk;
mod config;
mod embed;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use flatvec_core::{
    build_index, embedding_of, index_exists, list_stores, read_index, resolve, store_exists,
    top_k, write_index, write_store_cached, DocStore, Record, StoreCache,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use chunk::{split_paragraphs, DEFAULT_MAX_CHARS};
use config::CliConfig;
use embed::{make_embedder, Embedder, Provider};

/// Brute-force semantic search over flat files.
#[derive(Parser, Debug)]
#[command(name = "flatvec", version, about = "Ingest, index, and search FlatVec stores")]
struct Cli {
    /// Config file, created with defaults when missing.
    #[arg(long, env = "FLATVEC_CONFIG", default_value = "flatvec.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk text files into record stores with embeddings.
    Ingest {
        /// File or directory of files to ingest.
        source: PathBuf,
        /// Directory that receives the stores.
        docs_dir: PathBuf,
        /// Replace stores that already exist.
        #[arg(long)]
        overwrite: bool,
        /// Character cap per record.
        #[arg(long, default_value_t = DEFAULT_MAX_CHARS)]
        max_chars: usize,
        /// Embedding provider override.
        #[arg(short, long, value_enum)]
        provider: Option<Provider>,
    },
    /// Build a dense index over every store in a directory.
    Build {
        /// Index name.
        name: String,
        /// Directory that receives the index file.
        index_dir: PathBuf,
        /// Directory of stores to index.
        docs_dir: PathBuf,
        /// Replace an index that already exists.
        #[arg(long)]
        overwrite: bool,
    },
    /// Search an index and print the best-matching records.
    Search {
        /// Index name.
        name: String,
        /// Directory holding the index file.
        index_dir: PathBuf,
        /// Directory holding the stores the index references.
        docs_dir: PathBuf,
        /// Query text.
        query: String,
        /// Number of results.
        #[arg(short = 'k', long, default_value_t = 20)]
        top: usize,
        /// Embedding provider override.
        #[arg(short, long, value_enum)]
        provider: Option<Provider>,
    },
    /// List the stores in a directory.
    List {
        /// Directory of stores.
        docs_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = config::load_or_create(&cli.config)?;
    init_tracing(&cfg.logging.filter);

    match cli.command {
        Commands::Ingest {
            source,
            docs_dir,
            overwrite,
            max_chars,
            provider,
        } => ingest(&cfg, &source, &docs_dir, overwrite, max_chars, provider),
        Commands::Build {
            name,
            index_dir,
            docs_dir,
            overwrite,
        } => build(&name, &index_dir, &docs_dir, overwrite),
        Commands::Search {
            name,
            index_dir,
            docs_dir,
            query,
            top,
            provider,
        } => search(&cfg, &name, &index_dir, &docs_dir, &query, top, provider),
        Commands::List { docs_dir } => list(&docs_dir),
    }
}

/// `RUST_LOG` wins over the configured filter when set.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn ingest(
    cfg: &CliConfig,
    source: &Path,
    docs_dir: &Path,
    overwrite: bool,
    max_chars: usize,
    provider: Option<Provider>,
) -> Result<()> {
    let embedder = make_embedder(provider.unwrap_or(cfg.embedding.provider), &cfg.embedding)?;
    let files = source_files(source)?;
    tracing::debug!(provider = embedder.name(), files = files.len(), "ingest starting");
    fs::create_dir_all(docs_dir)?;
    let cache = StoreCache::new();
    for file in files {
        ingest_file(&cache, embedder.as_ref(), &file, docs_dir, overwrite, max_chars)?;
    }
    Ok(())
}

/// Every ingestible file under `source`, in name order. A file argument is
/// ingested as-is; a directory is scanned one level deep.
fn source_files(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(source)
        .with_context(|| format!("failed to read source directory {}", source.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn ingest_file(
    cache: &StoreCache,
    embedder: &dyn Embedder,
    file: &Path,
    docs_dir: &Path,
    overwrite: bool,
    max_chars: usize,
) -> Result<()> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("source path {} has no usable file name", file.display()))?;
    if !overwrite && store_exists(&name, docs_dir) {
        println!("{} {name}", style("exists, skipping").yellow());
        return Ok(());
    }

    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let chunks = split_paragraphs(&text, max_chars);
    let bar = ProgressBar::new(chunks.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} {msg}",
    )?);
    bar.set_message(name.clone());

    let mut records = Vec::with_capacity(chunks.len());
    for (ix, text) in chunks.into_iter().enumerate() {
        let embedding = embedder.embed(&text)?;
        records.push(
            Record::new()
                .with("text", text)
                .with("ix", ix as i64)
                .with("embedding", embedding),
        );
        bar.inc(1);
    }
    bar.finish_and_clear();

    let count = records.len();
    write_store_cached(cache, docs_dir, DocStore::new(name.clone(), records), overwrite)?;
    println!("{} {name} ({count} records)", style("wrote").green());
    Ok(())
}

fn build(name: &str, index_dir: &Path, docs_dir: &Path, overwrite: bool) -> Result<()> {
    if !overwrite && index_exists(name, index_dir) {
        println!("{} {name}", style("exists, skipping").yellow());
        return Ok(());
    }
    let started = Instant::now();
    let stores = list_stores(docs_dir)?;
    if stores.is_empty() {
        bail!("no stores found under {}", docs_dir.display());
    }
    let index = build_index(name, &stores, embedding_of)?;
    fs::create_dir_all(index_dir)?;
    write_index(&index, index_dir)?;
    println!(
        "{} {name} ({} vectors, dim {}, {:.2?})",
        style("built").green(),
        index.len(),
        index.dim(),
        started.elapsed()
    );
    Ok(())
}

fn search(
    cfg: &CliConfig,
    name: &str,
    index_dir: &Path,
    docs_dir: &Path,
    query: &str,
    top: usize,
    provider: Option<Provider>,
) -> Result<()> {
    let index = read_index(name, index_dir)?;
    println!("{} {} records", style("searching").cyan(), index.len());

    let embedder = make_embedder(provider.unwrap_or(cfg.embedding.provider), &cfg.embedding)?;
    tracing::debug!(provider = embedder.name(), "embedding query");
    let query_vec = embedder.embed(query)?;

    let started = Instant::now();
    let positions = top_k(&index, &query_vec, top)?;
    tracing::info!(elapsed = ?started.elapsed(), hits = positions.len(), "ranking finished");

    let cache = StoreCache::new();
    let results = resolve(&index, &positions, &cache, docs_dir, 0, top)?;
    for (rank, record) in results.records.iter().enumerate() {
        println!(
            "{} {}",
            style(format!("#{:>2}", rank + 1)).cyan(),
            record.text().unwrap_or("<no text>")
        );
    }
    Ok(())
}

fn list(docs_dir: &Path) -> Result<()> {
    let stores = list_stores(docs_dir)?;
    if stores.is_empty() {
        println!("{}", style("no stores").yellow());
        return Ok(());
    }
    for store in stores {
        println!("{} ({} records)", store.name, store.len());
    }
    Ok(())
}
