//! Preview fragments for formats that are not indexed as plain text.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use pdfium_render::prelude::{PdfRenderConfig, Pdfium};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::PreviewError;
use crate::source::FileHandle;

/// 1x1 transparent PNG used as the stand-in thumbnail for office formats.
const PLACEHOLDER_THUMBNAIL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0c8AAAAASUVORK5CYII=";

pub fn docx_placeholder() -> String {
    format!(
        r#"<div class="file-preview-placeholder">DOCX Preview: <img src="{PLACEHOLDER_THUMBNAIL}" alt="DOCX Thumbnail" class="file-preview-thumbnail" /></div>"#
    )
}

pub fn presentation_placeholder() -> String {
    format!(
        r#"<div class="file-preview-placeholder">PowerPoint Preview: <img src="{PLACEHOLDER_THUMBNAIL}" alt="PPT Thumbnail" class="file-preview-thumbnail" /></div>"#
    )
}

/// Link offered in place of a preview.
pub fn download_placeholder(file: &dyn FileHandle) -> String {
    let name = escape_html(file.name());
    format!(
        "Preview not available. <a href='{}' download='{}' target='_blank'>Download {}</a>",
        escape_html(&file.download_url()),
        name,
        name
    )
}

pub fn escape_html(unsafe_text: &str) -> String {
    let mut escaped = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Rasterizes the first page of a paginated document.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Returns the page as PNG bytes, scaled by `scale`.
    async fn render_first_page(&self, document: Vec<u8>, scale: f32) -> Result<Vec<u8>, PreviewError>;
}

/// Thumbnail for a PDF, falling back to a download link when rendering fails.
pub async fn pdf_preview(
    renderer: &dyn PageRenderer,
    file: &dyn FileHandle,
    document: Vec<u8>,
    scale: f32,
) -> String {
    match renderer.render_first_page(document, scale).await {
        Ok(png) => {
            debug!("Rendered PDF thumbnail for {} ({} bytes)", file.path(), png.len());
            format!(
                r#"<img src="data:image/png;base64,{}" alt="PDF Thumbnail" class="file-preview-thumbnail" />"#,
                STANDARD.encode(png)
            )
        }
        Err(e) => {
            warn!("Error generating PDF preview for {}: {}", file.path(), e);
            download_placeholder(file)
        }
    }
}

/// Renders pages with pdfium, bound at render time.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Uses the pdfium library at `library` if given, else the system one.
    pub fn new(library: Option<PathBuf>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    async fn render_first_page(&self, document: Vec<u8>, scale: f32) -> Result<Vec<u8>, PreviewError> {
        let library = self.library.clone();
        tokio::task::spawn_blocking(move || render_with_pdfium(library, &document, scale)).await?
    }
}

fn render_with_pdfium(
    library: Option<PathBuf>,
    document: &[u8],
    scale: f32,
) -> Result<Vec<u8>, PreviewError> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path).or_else(|_| Pdfium::bind_to_system_library()),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PreviewError::Render(format!("pdfium unavailable: {e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let pdf = pdfium
        .load_pdf_from_byte_slice(document, None)
        .map_err(|e| PreviewError::Render(format!("{e:?}")))?;
    let page = pdf
        .pages()
        .first()
        .map_err(|e| PreviewError::Render(format!("{e:?}")))?;
    let bitmap = page
        .render_with_config(&PdfRenderConfig::new().scale_page_by_factor(scale))
        .map_err(|e| PreviewError::Render(format!("{e:?}")))?;

    let width = u32::try_from(bitmap.width()).unwrap_or_default();
    let height = u32::try_from(bitmap.height()).unwrap_or_default();
    let raster = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
        .ok_or_else(|| PreviewError::Render("bitmap size mismatch".to_string()))?;

    encode_png(DynamicImage::ImageRgba8(raster))
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, PreviewError> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}
