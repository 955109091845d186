//! Walking dropped entries.
//!
//! A drop hands over a mix of file and directory entries. Directory entries
//! are enumerated through a stateful reader that returns children in
//! batches; the reader is exhausted once it returns an empty batch. Any
//! failure while reading aborts the whole walk.

use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::IndexError;
use crate::source::{is_linked_directory, FileHandle, LocalFile};

/// Children handed out per `read_entries` call by [`LocalEntry`] readers.
const READ_BATCH_SIZE: usize = 100;

pub enum DropEntry {
    File(Box<dyn FileEntry>),
    Directory(Box<dyn DirectoryEntry>),
}

impl DropEntry {
    pub fn full_path(&self) -> &str {
        match self {
            DropEntry::File(entry) => entry.full_path(),
            DropEntry::Directory(entry) => entry.full_path(),
        }
    }
}

#[async_trait]
pub trait FileEntry: Send + Sync {
    /// Path from the root of the drop, starting with `/`.
    fn full_path(&self) -> &str;

    /// Materializes the entry, keyed by its full path.
    async fn file(&self) -> Result<Box<dyn FileHandle>, IndexError>;
}

pub trait DirectoryEntry: Send + Sync {
    fn full_path(&self) -> &str;

    fn create_reader(&self) -> Box<dyn EntryReader>;
}

#[async_trait]
pub trait EntryReader: Send {
    /// Returns the next batch of children; an empty batch means exhausted.
    async fn read_entries(&mut self) -> Result<Vec<DropEntry>, IndexError>;
}

/// Lazily reads every child of a directory reader, one batch at a time.
pub fn children(reader: Box<dyn EntryReader>) -> BoxStream<'static, Result<DropEntry, IndexError>> {
    stream::try_unfold(reader, next_batch)
        .map_ok(|batch| stream::iter(batch.into_iter().map(Ok::<_, IndexError>)))
        .try_flatten()
        .boxed()
}

async fn next_batch(
    mut reader: Box<dyn EntryReader>,
) -> Result<Option<(Vec<DropEntry>, Box<dyn EntryReader>)>, IndexError> {
    let batch = reader.read_entries().await?;
    if batch.is_empty() {
        return Ok(None);
    }
    Ok(Some((batch, reader)))
}

/// Walks all dropped entries and materializes every file found.
///
/// Top-level entries are walked concurrently, each subtree sequentially and
/// depth-first. The first failure rejects the whole walk.
pub async fn walk_entries(entries: Vec<DropEntry>) -> Result<Vec<Box<dyn FileHandle>>, IndexError> {
    let subtrees = try_join_all(entries.into_iter().map(walk_entry)).await?;
    let file_entries: Vec<Box<dyn FileEntry>> = subtrees.into_iter().flatten().collect();

    debug!("Found {} file entries, materializing", file_entries.len());
    try_join_all(file_entries.iter().map(|entry| entry.file())).await
}

fn walk_entry(entry: DropEntry) -> BoxFuture<'static, Result<Vec<Box<dyn FileEntry>>, IndexError>> {
    async move {
        match entry {
            DropEntry::File(file) => Ok(vec![file]),
            DropEntry::Directory(dir) => {
                let entries: Vec<DropEntry> = children(dir.create_reader()).try_collect().await?;
                debug!("Read {} children of {}", entries.len(), dir.full_path());

                let mut files = Vec::new();
                for child in entries {
                    files.extend(walk_entry(child).await?);
                }
                Ok(files)
            }
        }
    }
    .boxed()
}

/// Drop entries backed by the local filesystem.
pub struct LocalEntry;

impl LocalEntry {
    /// Builds a top-level entry for `path`, named after its last component.
    pub async fn from_path(path: &Path) -> Result<DropEntry, IndexError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::entry(path.to_path_buf(), format!("/{name}")).await
    }

    async fn entry(location: PathBuf, full_path: String) -> Result<DropEntry, IndexError> {
        let metadata = tokio::fs::metadata(&location).await?;
        if metadata.is_dir() {
            Ok(DropEntry::Directory(Box::new(LocalDirectoryEntry {
                location,
                full_path,
            })))
        } else {
            Ok(DropEntry::File(Box::new(LocalFileEntry {
                location,
                full_path,
            })))
        }
    }
}

struct LocalFileEntry {
    location: PathBuf,
    full_path: String,
}

#[async_trait]
impl FileEntry for LocalFileEntry {
    fn full_path(&self) -> &str {
        &self.full_path
    }

    async fn file(&self) -> Result<Box<dyn FileHandle>, IndexError> {
        let file = LocalFile::open(&self.location, self.full_path.clone()).await?;
        Ok(Box::new(file))
    }
}

struct LocalDirectoryEntry {
    location: PathBuf,
    full_path: String,
}

impl DirectoryEntry for LocalDirectoryEntry {
    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn create_reader(&self) -> Box<dyn EntryReader> {
        Box::new(LocalEntryReader {
            location: self.location.clone(),
            full_path: self.full_path.clone(),
            read_dir: None,
            exhausted: false,
        })
    }
}

struct LocalEntryReader {
    location: PathBuf,
    full_path: String,
    read_dir: Option<tokio::fs::ReadDir>,
    exhausted: bool,
}

#[async_trait]
impl EntryReader for LocalEntryReader {
    async fn read_entries(&mut self) -> Result<Vec<DropEntry>, IndexError> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        if self.read_dir.is_none() {
            let read_dir = tokio::fs::read_dir(&self.location)
                .await
                .map_err(|e| traversal_error(&self.full_path, e))?;
            self.read_dir = Some(read_dir);
        }
        let Some(read_dir) = self.read_dir.as_mut() else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();
        while batch.len() < READ_BATCH_SIZE {
            let next = read_dir
                .next_entry()
                .await
                .map_err(|e| traversal_error(&self.full_path, e))?;
            let Some(dir_entry) = next else {
                self.exhausted = true;
                break;
            };

            if is_linked_directory(&dir_entry).await {
                debug!("Skipping linked directory {}", dir_entry.path().display());
                continue;
            }

            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let full_path = format!("{}/{}", self.full_path, name);
            batch.push(LocalEntry::entry(dir_entry.path(), full_path).await?);
        }

        Ok(batch)
    }
}

fn traversal_error(path: &str, error: std::io::Error) -> IndexError {
    IndexError::Traversal {
        path: path.to_string(),
        reason: error.to_string(),
    }
}
