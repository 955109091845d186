use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read directory {path}: {reason}")]
    Traversal { path: String, reason: String },
    #[error("Failed to access {path}: {reason}")]
    Access { path: String, reason: String },
    #[error("Selection cancelled")]
    Cancelled,
    #[error("Indexing aborted: {0}")]
    Aborted(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Quota exceeded: {needed} bytes requested, {quota} bytes available")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("PDF render error: {0}")]
    Render(String),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}
