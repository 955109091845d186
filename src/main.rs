//! # mini-index CLI
//!
//! Indexes local files into a searchable, path-keyed index.
//!
//! - `mini-index index <DIR>` - index everything below a directory
//! - `mini-index drop <PATH>...` - index dropped files and folders
//! - `mini-index pick` - prompt for a directory (or file) to index
//! - `mini-index search <QUERY>` - search the stored index
//! - `mini-index show <PATH>` - print one indexed file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use mini_index::directory::LocalDirectory;
use mini_index::entries::LocalEntry;
use mini_index::extract::ContentExtractor;
use mini_index::indexer::PICKER_UNAVAILABLE;
use mini_index::models::format_file_size;
use mini_index::preview::PdfiumRenderer;
use mini_index::source::LocalFile;
use mini_index::storage::{FileKvStore, SurrealRecordStore};
use mini_index::{
    Capabilities, Config, FileIndex, IndexError, IndexPersistence, IndexStore, Indexer,
    IndexerConfig, RunOutcome, SearchEngine, SearchOutcome, Selection, StatusSink,
};

#[derive(Parser)]
#[command(name = "mini-index")]
#[command(about = "Index local files and search their content")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/mini-index/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory
    Index {
        /// Directory to index
        dir: PathBuf,
    },

    /// Index dropped files and folders
    Drop {
        /// Files or folders, as they were dropped
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Prompt for a directory or file to index
    Pick,

    /// Search the stored index
    Search {
        /// Case-insensitive text to look for in names and content
        query: String,
    },

    /// Print the stored content of one file
    Show {
        /// Path of the file as it was indexed
        path: String,
    },
}

/// Prints run status to the terminal.
#[derive(Default)]
struct ConsoleStatus {
    progress_visible: AtomicBool,
}

impl StatusSink for ConsoleStatus {
    fn status(&self, message: &str) {
        if self.progress_visible.load(Ordering::Relaxed) {
            eprintln!();
        }
        println!("{}", message);
    }

    fn progress(&self, percent: f64) {
        if self.progress_visible.load(Ordering::Relaxed) {
            eprint!("\rProgress: {:>3.0}%", percent);
            let _ = std::io::stderr().flush();
        }
    }

    fn show_progress(&self) {
        self.progress_visible.store(true, Ordering::Relaxed);
    }

    fn hide_progress(&self) {
        if self.progress_visible.swap(false, Ordering::Relaxed) {
            eprintln!();
        }
    }

    fn render(&self, index: &FileIndex) {
        self.hide_progress();
        print_file_list(index.records());
    }
}

fn print_file_list<'a>(records: impl Iterator<Item = &'a mini_index::FileRecord>) {
    for record in records {
        println!(
            "  {} ({})  {}",
            record.name,
            format_file_size(record.size),
            record.path
        );
    }
}

fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

async fn open_store(config: &Config) -> Result<Arc<IndexStore>> {
    let data_dir = &config.storage.data_dir;
    debug!("Using data directory {}", data_dir.display());

    let bounded = FileKvStore::open(data_dir, config.storage.bounded_quota_bytes)
        .await
        .with_context(|| format!("Failed to open bounded store in {}", data_dir.display()))?;
    let unbounded = SurrealRecordStore::open(data_dir)
        .await
        .with_context(|| format!("Failed to open database in {}", data_dir.display()))?;

    Ok(Arc::new(
        IndexStore::new(Arc::new(bounded), Arc::new(unbounded))
            .with_threshold(config.storage.bounded_threshold_bytes),
    ))
}

fn build_indexer(config: &Config, capabilities: &Capabilities, store: Arc<IndexStore>) -> Indexer {
    let renderer = Arc::new(PdfiumRenderer::new(config.preview.pdfium_library.clone()));
    Indexer::new(
        ContentExtractor::new(renderer, config.preview.pdf_scale),
        store,
        Arc::new(ConsoleStatus::default()),
        IndexerConfig {
            persist: config.indexing.should_persist(capabilities),
            progress_clear_delay: config.indexing.progress_clear_delay(),
        },
    )
}

/// Reads one line from stdin; an empty answer cancels the selection.
async fn prompt_selection() -> Result<Selection, IndexError> {
    print!("Directory or file to index (empty to cancel): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let answer = line.trim();
    if answer.is_empty() {
        return Err(IndexError::Cancelled);
    }

    selection_for(Path::new(answer)).await
}

async fn selection_for(path: &Path) -> Result<Selection, IndexError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| IndexError::Access {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if metadata.is_dir() {
        Ok(Selection::Directory(Box::new(LocalDirectory::open(path).await?)))
    } else {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Selection::Files(vec![Box::new(LocalFile::open(path, name).await?)]))
    }
}

fn summarize(outcome: &RunOutcome) {
    if let RunOutcome::Indexed(report) = outcome {
        debug!(
            "Run finished: {} files, {} records, persisted: {:?}",
            report.files,
            report.index.len(),
            report.persisted
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    init_logging(cli.verbose, &config.logging.level)?;

    let capabilities = Capabilities::detect();
    debug!("Detected capabilities: {:?}", capabilities);

    match cli.command {
        Commands::Index { dir } => {
            if !capabilities.directory_picker {
                println!("{}", PICKER_UNAVAILABLE);
                return Ok(());
            }

            let store = open_store(&config).await?;
            let indexer = build_indexer(&config, &capabilities, store);
            let outcome = indexer
                .index_selection(selection_for(&dir).await)
                .await
                .with_context(|| format!("Failed to index {}", dir.display()))?;
            summarize(&outcome);
        }

        Commands::Drop { paths } => {
            let mut entries = Vec::with_capacity(paths.len());
            for path in &paths {
                match LocalEntry::from_path(path).await {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!("Ignoring {}: {}", path.display(), e),
                }
            }

            let store = open_store(&config).await?;
            let indexer = build_indexer(&config, &capabilities, store);
            let outcome = indexer
                .index_drop(entries)
                .await
                .context("Failed to index dropped items")?;
            summarize(&outcome);
        }

        Commands::Pick => {
            let store = open_store(&config).await?;
            let indexer = build_indexer(&config, &capabilities, store);
            let outcome = indexer
                .pick_and_index(&capabilities, prompt_selection())
                .await
                .context("Failed to index selection")?;
            summarize(&outcome);
        }

        Commands::Search { query } => {
            let store = open_store(&config).await?;
            let engine = SearchEngine::new(store);

            match engine.search(&query).await {
                Ok(SearchOutcome::NoQuery) => println!("Enter a search term to find files."),
                Ok(SearchOutcome::Matches(results)) if results.is_empty() => {
                    println!("No files match your search query.")
                }
                Ok(SearchOutcome::Matches(results)) => {
                    println!("Search Results for \"{}\"", query.to_lowercase());
                    print_file_list(results.iter());
                }
                Err(e) => {
                    warn!("Search error: {}", e);
                    println!("Error accessing the file index.");
                }
            }
        }

        Commands::Show { path } => {
            let store = open_store(&config).await?;
            let index = store.load_all().await.context("Failed to load the file index")?;

            match index.get(&path) {
                Some(record) => {
                    println!("{} ({})", record.name, format_file_size(record.size));
                    println!("{}", record.content);
                }
                None => anyhow::bail!("No indexed file at {}", path),
            }
        }
    }

    Ok(())
}
