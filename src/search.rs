//! Case-insensitive substring search over the file index.

use std::sync::Arc;
use tracing::debug;

use crate::error::StorageError;
use crate::models::{FileIndex, FileRecord};
use crate::storage::IndexPersistence;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The query was blank; nothing was searched.
    NoQuery,
    /// Matching records in index order, possibly none.
    Matches(Vec<FileRecord>),
}

/// Matches `query` against each record's name, then its content.
pub fn search(query: &str, index: &FileIndex) -> SearchOutcome {
    if query.trim().is_empty() {
        return SearchOutcome::NoQuery;
    }

    let needle = query.to_lowercase();
    let matches = index
        .records()
        .filter(|file| {
            file.name.to_lowercase().contains(&needle)
                || (!file.content.is_empty() && file.content.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();

    SearchOutcome::Matches(matches)
}

/// Searches whatever index is currently persisted.
pub struct SearchEngine {
    store: Arc<dyn IndexPersistence>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn IndexPersistence>) -> Self {
        Self { store }
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, StorageError> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::NoQuery);
        }

        let index = self.store.load_all().await?;
        debug!("Searching {} indexed files for {:?}", index.len(), query);
        Ok(search(query, &index))
    }
}
