pub mod docx;
pub mod pdf;
pub mod r#trait;

pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;
pub use r#trait::TextExtractor;

use crate::utils;
use anyhow::{Context, Result};
use tracing::warn;

/// Extensions decoded as UTF-8 text
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "json", "csv", "tsv", "yaml", "yml", "toml", "ini", "xml", "html",
    "htm", "py", "java", "js", "ts", "rs", "go", "cpp", "c", "h", "hpp", "sh", "log",
];

/// Default extractor: PDF, DOCX and plain-text formats
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor {
    pdf: PdfExtractor,
    docx: DocxExtractor,
}

impl DocumentExtractor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, content: &[u8], extension: Option<&str>) -> Result<String> {
        let ext = extension
            .map(|e| e.to_lowercase())
            .context("Cannot determine file type without extension")?;

        if self.pdf.supports_extension(&ext) {
            return self.pdf.extract(content, Some(&ext)).await;
        }
        if self.docx.supports_extension(&ext) {
            return self.docx.extract(content, Some(&ext)).await;
        }
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            return String::from_utf8(content.to_vec())
                .with_context(|| format!("Content of .{ext} file is not valid UTF-8"));
        }

        anyhow::bail!("Unsupported file extension: {ext}")
    }

    fn supports_extension(&self, ext: &str) -> bool {
        self.pdf.supports_extension(ext)
            || self.docx.supports_extension(ext)
            || TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Run an extractor and never fail: extraction errors become empty text.
/// Successful output is whitespace-normalized and cut to `max_chars`.
pub async fn extract_text(
    extractor: &dyn TextExtractor,
    content: &[u8],
    extension: Option<&str>,
    max_chars: Option<usize>,
) -> String {
    if content.is_empty() {
        return String::new();
    }

    let raw = match extractor.extract(content, extension).await {
        Ok(text) => text,
        Err(e) => {
            warn!(extension = extension.unwrap_or("-"), "text extraction failed: {e:#}");
            return String::new();
        }
    };

    let normalized = utils::normalize_whitespace(&raw);
    match max_chars {
        Some(limit) => utils::truncate_chars(&normalized, limit).to_string(),
        None => normalized,
    }
}
