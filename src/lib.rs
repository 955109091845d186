//! Local file indexing: walk dropped or picked files, extract their content
//! into a path-keyed index, persist it across two storage tiers and search it.

pub mod capabilities;
pub mod config;
pub mod directory;
pub mod entries;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod models;
pub mod preview;
pub mod search;
pub mod source;
pub mod storage;

pub use capabilities::Capabilities;
pub use config::Config;
pub use error::{ConfigError, IndexError, PreviewError, StorageError};
pub use indexer::{Indexer, IndexerConfig, RunOutcome, RunReport, Selection, StatusSink};
pub use models::{FileIndex, FileRecord, CONTENT_NOT_AVAILABLE};
pub use search::{SearchEngine, SearchOutcome};
pub use storage::{IndexPersistence, IndexStore, Tier};
