//! Per-file content extraction.
//!
//! Extraction never fails: a file that cannot be read still yields a record,
//! with [`CONTENT_NOT_AVAILABLE`] as its content.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{FileRecord, CONTENT_NOT_AVAILABLE};
use crate::preview::{self, PageRenderer};
use crate::source::FileHandle;

/// Extensions read as text regardless of their declared type.
const TEXT_LIKE_EXTENSIONS: &[&str] = &[
    "md", "json", "csv", "txt", "js", "html", "css", "docx", "pdf", "ppt", "pptx",
];

/// Text-like formats whose content is transformed after reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialFormat {
    Csv,
    Docx,
    Pdf,
    Presentation,
}

impl SpecialFormat {
    fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "csv" => Some(Self::Csv),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            "ppt" | "pptx" => Some(Self::Presentation),
            _ => None,
        }
    }
}

/// Lowercased text after the last dot of `name`, if any.
fn extension(name: &str) -> Option<String> {
    name.rfind('.').map(|dot| name[dot + 1..].to_ascii_lowercase())
}

pub fn is_text_like(mime_type: &str, name: &str) -> bool {
    mime_type.starts_with("text/")
        || extension(name).is_some_and(|ext| TEXT_LIKE_EXTENSIONS.contains(&ext.as_str()))
}

/// Renders CSV as rows of ` | `-separated cells. Quoted commas and embedded
/// newlines are not understood.
pub fn csv_to_table(text: &str) -> String {
    text.split('\n')
        .map(|row| row.split(',').map(str::trim).collect::<Vec<_>>().join(" | "))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ContentExtractor {
    renderer: Arc<dyn PageRenderer>,
    pdf_scale: f32,
}

impl ContentExtractor {
    pub fn new(renderer: Arc<dyn PageRenderer>, pdf_scale: f32) -> Self {
        Self {
            renderer,
            pdf_scale,
        }
    }

    pub async fn extract(&self, file: &dyn FileHandle) -> FileRecord {
        let content = if is_text_like(file.mime_type(), file.name()) {
            self.extract_text(file).await
        } else {
            preview::download_placeholder(file)
        };

        FileRecord {
            name: file.name().to_string(),
            path: file.path().to_string(),
            size: file.size(),
            mime_type: file.mime_type().to_string(),
            last_modified: file.last_modified(),
            content,
        }
    }

    async fn extract_text(&self, file: &dyn FileHandle) -> String {
        let bytes = match file.read_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Error reading file {}: {}", file.path(), e);
                return CONTENT_NOT_AVAILABLE.to_string();
            }
        };

        let format = extension(file.name()).and_then(|ext| SpecialFormat::from_extension(&ext));
        debug!("Extracting {} as {:?}", file.path(), format);

        let content = match format {
            Some(SpecialFormat::Csv) => csv_to_table(&String::from_utf8_lossy(&bytes)),
            Some(SpecialFormat::Docx) => preview::docx_placeholder(),
            Some(SpecialFormat::Presentation) => preview::presentation_placeholder(),
            Some(SpecialFormat::Pdf) => {
                preview::pdf_preview(self.renderer.as_ref(), file, bytes, self.pdf_scale).await
            }
            None => String::from_utf8_lossy(&bytes).into_owned(),
        };

        if content.is_empty() {
            CONTENT_NOT_AVAILABLE.to_string()
        } else {
            content
        }
    }
}
