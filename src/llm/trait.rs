use crate::errors::ModelError;

/// A remote language model reachable with a single text prompt
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` and return the model's text answer.
    /// Never retries internally; callers decide.
    async fn call(&self, prompt: &str) -> Result<String, ModelError>;
}
