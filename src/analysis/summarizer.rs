use crate::analysis::prompt;
use crate::errors::ModelError;
use crate::llm::LanguageModel;
use std::sync::Arc;

/// Produces the canonical summary of a file's extracted text
pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
}

impl Summarizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn summarize(&self, file_name: &str, content: &str) -> Result<String, ModelError> {
        let prompt = prompt::build_summarization_prompt(file_name, content);
        let summary = self.model.call(&prompt).await?.trim().to_string();
        if summary.is_empty() {
            return Err(ModelError::MalformedResponse("empty summary".to_string()));
        }
        Ok(summary)
    }
}
