pub mod gemini;
pub mod r#trait;

pub use gemini::GeminiClient;
pub use r#trait::LanguageModel;
