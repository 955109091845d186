//! Two-tier persistence for the file index.
//!
//! Indexes that serialize below the threshold are kept as a single JSON blob
//! in the bounded tier. Larger ones, or ones the bounded tier refuses, go to
//! the unbounded tier.

pub mod bounded;
pub mod unbounded;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::StorageError;
use crate::models::FileIndex;

pub use bounded::{FileKvStore, KvStore, MemoryKvStore};
pub use unbounded::{RecordStore, SurrealRecordStore};

/// Key of the serialized index in the bounded tier.
pub const INDEX_KEY: &str = "fileIndex";

/// Default size limit for the bounded tier (5 MiB).
pub const DEFAULT_BOUNDED_THRESHOLD: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Bounded,
    Unbounded,
}

#[async_trait]
pub trait IndexPersistence: Send + Sync {
    /// Replaces the stored index, returning the tier that took it.
    async fn save(&self, index: &FileIndex) -> Result<Tier, StorageError>;

    async fn load_all(&self) -> Result<FileIndex, StorageError>;
}

pub struct IndexStore {
    bounded: Arc<dyn KvStore>,
    unbounded: Arc<dyn RecordStore>,
    threshold: usize,
}

impl IndexStore {
    pub fn new(bounded: Arc<dyn KvStore>, unbounded: Arc<dyn RecordStore>) -> Self {
        Self {
            bounded,
            unbounded,
            threshold: DEFAULT_BOUNDED_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    async fn save_unbounded(&self, index: &FileIndex) -> Result<Tier, StorageError> {
        if let Err(e) = self.unbounded.replace_all(index).await {
            error!("Error saving file index to the unbounded tier: {}", e);
            return Err(e);
        }

        // an older blob would otherwise shadow this index on load
        if let Err(e) = self.bounded.remove_item(INDEX_KEY).await {
            warn!("Failed to remove stale {} blob: {}", INDEX_KEY, e);
        }
        Ok(Tier::Unbounded)
    }
}

#[async_trait]
impl IndexPersistence for IndexStore {
    async fn save(&self, index: &FileIndex) -> Result<Tier, StorageError> {
        let blob = serde_json::to_string(index)?;

        if blob.len() >= self.threshold {
            debug!(
                "Index is {} bytes, over the {} byte threshold",
                blob.len(),
                self.threshold
            );
            return self.save_unbounded(index).await;
        }

        match self.bounded.set_item(INDEX_KEY, &blob).await {
            Ok(()) => Ok(Tier::Bounded),
            Err(e) => {
                warn!("Error saving file index to the bounded tier: {}", e);
                self.save_unbounded(index).await
            }
        }
    }

    async fn load_all(&self) -> Result<FileIndex, StorageError> {
        match self.bounded.get_item(INDEX_KEY).await {
            Ok(Some(blob)) => match serde_json::from_str(&blob) {
                Ok(index) => return Ok(index),
                Err(e) => warn!("Stored {} blob is unreadable: {}", INDEX_KEY, e),
            },
            Ok(None) => debug!("No {} blob, reading the unbounded tier", INDEX_KEY),
            Err(e) => warn!("Error reading the bounded tier: {}", e),
        }

        self.unbounded.load_all().await
    }
}
