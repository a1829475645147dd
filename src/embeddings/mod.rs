pub mod ollama;
pub mod r#trait;

pub use ollama::OllamaEmbeddingProvider;
pub use r#trait::EmbeddingProvider;
