//! Walking a picked directory handle.
//!
//! Unlike dropped entries, a picked directory is walked leniently: a file or
//! subdirectory that cannot be accessed is logged and skipped.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::error::IndexError;
use crate::source::{is_linked_directory, FileHandle, LocalFile};

pub enum DirectoryChild {
    File(Box<dyn PickedFile>),
    Directory(Box<dyn DirectoryHandle>),
}

impl DirectoryChild {
    pub fn name(&self) -> &str {
        match self {
            DirectoryChild::File(file) => file.name(),
            DirectoryChild::Directory(dir) => dir.name(),
        }
    }
}

pub trait DirectoryHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Direct children, in whatever order the host reports them.
    fn values(&self) -> BoxStream<'_, Result<DirectoryChild, IndexError>>;
}

#[async_trait]
pub trait PickedFile: Send + Sync {
    fn name(&self) -> &str;

    /// Materializes the file, keyed by `relative_path`.
    async fn get_file(&self, relative_path: String) -> Result<Box<dyn FileHandle>, IndexError>;
}

/// Collects every accessible file below `dir`.
///
/// An empty `base_path` marks the root of the walk; children of the root are
/// keyed by their bare name, deeper ones by `base_path/name`.
pub fn walk_directory<'a>(
    dir: &'a dyn DirectoryHandle,
    base_path: &'a str,
) -> BoxFuture<'a, Vec<Box<dyn FileHandle>>> {
    async move {
        let mut files = Vec::new();
        let mut children = dir.values();

        while let Some(child) = children.next().await {
            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    error!("Error traversing directory {}: {}", dir.name(), e);
                    break;
                }
            };

            let entry_path = if base_path.is_empty() {
                child.name().to_string()
            } else {
                format!("{}/{}", base_path, child.name())
            };

            match child {
                DirectoryChild::File(file) => match file.get_file(entry_path.clone()).await {
                    Ok(handle) => files.push(handle),
                    Err(e) => error!("Error accessing file {}: {}", entry_path, e),
                },
                DirectoryChild::Directory(subdir) => {
                    let nested = walk_directory(subdir.as_ref(), &entry_path).await;
                    debug!("Collected {} files from {}", nested.len(), entry_path);
                    files.extend(nested);
                }
            }
        }

        files
    }
    .boxed()
}

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    location: PathBuf,
    name: String,
}

impl LocalDirectory {
    pub async fn open(location: &Path) -> Result<Self, IndexError> {
        let metadata = tokio::fs::metadata(location).await?;
        if !metadata.is_dir() {
            return Err(IndexError::Access {
                path: location.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let name = location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| location.display().to_string());

        Ok(Self {
            location: location.to_path_buf(),
            name,
        })
    }
}

impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn values(&self) -> BoxStream<'_, Result<DirectoryChild, IndexError>> {
        stream::try_unfold(ReadState::Unopened(self.location.clone()), next_child).boxed()
    }
}

enum ReadState {
    Unopened(PathBuf),
    Reading(tokio::fs::ReadDir),
}

async fn next_child(state: ReadState) -> Result<Option<(DirectoryChild, ReadState)>, IndexError> {
    let mut read_dir = match state {
        ReadState::Unopened(location) => tokio::fs::read_dir(&location).await?,
        ReadState::Reading(read_dir) => read_dir,
    };

    let entry = loop {
        let Some(entry) = read_dir.next_entry().await? else {
            return Ok(None);
        };
        if is_linked_directory(&entry).await {
            debug!("Skipping linked directory {}", entry.path().display());
            continue;
        }
        break entry;
    };

    let location = entry.path();
    let name = entry.file_name().to_string_lossy().into_owned();
    let is_dir = tokio::fs::metadata(&location)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false);

    let child = if is_dir {
        DirectoryChild::Directory(Box::new(LocalDirectory { location, name }))
    } else {
        DirectoryChild::File(Box::new(LocalPickedFile { location, name }))
    };

    Ok(Some((child, ReadState::Reading(read_dir))))
}

struct LocalPickedFile {
    location: PathBuf,
    name: String,
}

#[async_trait]
impl PickedFile for LocalPickedFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_file(&self, relative_path: String) -> Result<Box<dyn FileHandle>, IndexError> {
        let file = LocalFile::open(&self.location, relative_path).await?;
        Ok(Box::new(file))
    }
}
