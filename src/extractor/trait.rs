use anyhow::Result;

/// Trait for text extractors that turn raw file bytes into plain text
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text content from the raw bytes of a file.
    /// `extension` is the lower-cased type hint (without the dot).
    async fn extract(&self, content: &[u8], extension: Option<&str>) -> Result<String>;

    /// Check if this extractor supports the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}
