use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Content value used whenever nothing readable could be produced for a file.
pub const CONTENT_NOT_AVAILABLE: &str = "Content not available";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(rename = "lastModified")]
    pub last_modified: i64,
    #[serde(default)]
    pub content: String,
}

/// Mapping from relative path to record for one indexing run.
///
/// Serializes as a plain JSON object keyed by path. Iteration follows
/// insertion order; inserting a path that is already present replaces the
/// record in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileIndex {
    files: IndexMap<String, FileRecord>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record under its own path, returning the record it replaced.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.files.insert(record.path.clone(), record)
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }
}

impl FromIterator<FileRecord> for FileIndex {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut index = FileIndex::new();
        for record in iter {
            index.insert(record);
        }
        index
    }
}

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Formats a byte count for display, e.g. `1536` becomes `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}
