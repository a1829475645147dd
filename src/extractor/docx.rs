use crate::extractor::r#trait::TextExtractor;
use anyhow::{Context, Result};
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";

/// DOCX extractor: reads the main document part out of the zip container
/// and keeps the paragraph text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_blocking(content: &[u8]) -> Result<String> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(content)).context("Failed to read DOCX container")?;
        let mut part = archive
            .by_name(DOCUMENT_PART)
            .with_context(|| format!("DOCX has no {DOCUMENT_PART}"))?;

        let mut xml = String::new();
        part.read_to_string(&mut xml)
            .context("DOCX document part is not valid UTF-8")?;

        Ok(xml_to_text(&xml))
    }
}

/// Strip WordprocessingML markup, turning paragraph ends into newlines
fn xml_to_text(xml: &str) -> String {
    let mut text = String::with_capacity(xml.len() / 4);
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        text.push_str(&decode_entities(&rest[..start]));
        let Some(end) = rest[start..].find('>') else {
            rest = "";
            break;
        };
        let tag = &rest[start + 1..start + end];
        if tag == "/w:p" {
            text.push('\n');
        } else if tag.starts_with("w:tab") || tag.starts_with("w:br") {
            text.push(' ');
        }
        rest = &rest[start + end + 1..];
    }
    text.push_str(&decode_entities(rest));

    text.trim().to_string()
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[async_trait::async_trait]
impl TextExtractor for DocxExtractor {
    async fn extract(&self, content: &[u8], _extension: Option<&str>) -> Result<String> {
        let bytes = content.to_vec();
        tokio::task::spawn_blocking(move || Self::extract_blocking(&bytes))
            .await
            .context("DOCX extraction task panicked")?
    }

    fn supports_extension(&self, ext: &str) -> bool {
        ext.eq_ignore_ascii_case("docx")
    }
}
