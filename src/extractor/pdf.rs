use crate::extractor::r#trait::TextExtractor;
use anyhow::{Context, Result};
use tracing::debug;

/// PDF text extractor working on in-memory bytes.
/// Page text comes from lopdf; pdf-extract is the fallback for documents
/// where lopdf finds no text layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_blocking(content: &[u8]) -> Result<String> {
        let mut text = String::new();
        match lopdf::Document::load_mem(content) {
            Ok(doc) => {
                for page_num in doc.get_pages().keys() {
                    if let Ok(page_text) = doc.extract_text(&[*page_num]) {
                        text.push_str(&page_text);
                        text.push('\n');
                    }
                }
            }
            Err(e) => debug!("lopdf could not load document: {e}"),
        }

        if !text.trim().is_empty() {
            return Ok(text.trim().to_string());
        }

        let fallback = pdf_extract::extract_text_from_mem(content)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Failed to extract PDF text")?;
        Ok(fallback.trim().to_string())
    }
}

#[async_trait::async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, content: &[u8], _extension: Option<&str>) -> Result<String> {
        let bytes = content.to_vec();
        tokio::task::spawn_blocking(move || Self::extract_blocking(&bytes))
            .await
            .context("PDF extraction task panicked")?
    }

    fn supports_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case("pdf")
    }
}
