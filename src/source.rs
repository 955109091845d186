//! Materialized files handed from the walkers to the extractor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::IndexError;

/// A walked file: its metadata plus a way to read its bytes.
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Relative path used as the index key.
    fn path(&self) -> &str;

    fn size(&self) -> u64;

    /// Declared MIME type, empty when unknown.
    fn mime_type(&self) -> &str;

    /// Epoch milliseconds.
    fn last_modified(&self) -> i64;

    /// Link target offered when no preview can be produced.
    fn download_url(&self) -> String;

    async fn read_bytes(&self) -> Result<Vec<u8>, IndexError>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    location: PathBuf,
    name: String,
    path: String,
    size: u64,
    mime_type: String,
    last_modified: i64,
}

impl LocalFile {
    /// Reads the metadata of `location`, keying the file under `relative_path`.
    pub async fn open(location: &Path, relative_path: String) -> Result<Self, IndexError> {
        let metadata = tokio::fs::metadata(location).await?;
        let name = location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative_path.clone());
        let last_modified = metadata
            .modified()
            .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(location)
            .first_raw()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            location: location.to_path_buf(),
            name,
            path: relative_path,
            size: metadata.len(),
            mime_type,
            last_modified,
        })
    }
}

/// True when `entry` is a symbolic link resolving to a directory. Walkers
/// skip these so a link back up the tree cannot recurse forever.
pub(crate) async fn is_linked_directory(entry: &tokio::fs::DirEntry) -> bool {
    match entry.file_type().await {
        Ok(file_type) if file_type.is_symlink() => tokio::fs::metadata(entry.path())
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false),
        _ => false,
    }
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn download_url(&self) -> String {
        let absolute = std::path::absolute(&self.location).unwrap_or_else(|_| self.location.clone());
        format!("file://{}", absolute.display())
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, IndexError> {
        Ok(tokio::fs::read(&self.location).await?)
    }
}

/// An in-memory file, for hosts that already hold the bytes.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    path: String,
    mime_type: String,
    last_modified: i64,
    data: Vec<u8>,
    read_delay: Option<Duration>,
    fail_reads: bool,
}

impl MemoryFile {
    /// Creates a file keyed by `path`, named after its last path segment.
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        let mime_type = mime_guess::from_path(&name)
            .first_raw()
            .unwrap_or_default()
            .to_string();

        Self {
            name,
            path,
            mime_type,
            last_modified: Utc::now().timestamp_millis(),
            data: data.into(),
            read_delay: None,
            fail_reads: false,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_last_modified(mut self, last_modified: i64) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Delays every read, so callers can control settle order.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Makes every read fail.
    pub fn failing(mut self) -> Self {
        self.fail_reads = true;
        self
    }
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn download_url(&self) -> String {
        format!("memory:{}", self.path)
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, IndexError> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads {
            return Err(IndexError::Access {
                path: self.path.clone(),
                reason: "read failed".to_string(),
            });
        }
        Ok(self.data.clone())
    }
}
