use crate::config::Config;
use crate::errors::ModelError;
use crate::llm::LanguageModel;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Client for the `generateContent` endpoint of the Gemini API
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "topP")]
    top_p: f32,
}

impl GeminiClient {
    /// Create a new client
    /// Default endpoint: https://generativelanguage.googleapis.com/v1beta/models
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            temperature,
        }
    }

    /// Client configured for summarization
    pub fn summarizer_from_config(config: &Config) -> Self {
        Self::new(
            &config.model.endpoint,
            &config.model.summary_model,
            config.model_api_key(),
            config.model.summary_temperature,
            Duration::from_secs(config.model.timeout_secs),
        )
    }

    /// Client configured for classification
    pub fn classifier_from_config(config: &Config) -> Self {
        Self::new(
            &config.model.endpoint,
            &config.model.classifier_model,
            config.model_api_key(),
            config.model.classifier_temperature,
            Duration::from_secs(config.model.timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }

    /// Pull `candidates[0].content.parts[0].text` out of a response body
    fn parse_text(body: &Value) -> Result<String, ModelError> {
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(|text| text.to_string())
            .ok_or_else(|| ModelError::MalformedResponse(truncate_body(&body.to_string())))
    }
}

fn truncate_body(body: &str) -> String {
    crate::utils::truncate_chars(body, 200).to_string()
}

#[async_trait::async_trait]
impl LanguageModel for GeminiClient {
    async fn call(&self, prompt: &str) -> Result<String, ModelError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_k: 40,
                top_p: 0.95,
            },
        };

        let mut builder = self.http.post(self.url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("key", key.as_str())]);
        }

        debug!(model = %self.model, prompt_chars = prompt.len(), "calling model");
        let response = builder
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("failed to reach {}: {e}", self.model)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable(format!(
                "model API returned {status}: {}",
                truncate_body(&error_text)
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                ModelError::MalformedResponse(format!("response is not JSON: {e}"))
            } else {
                ModelError::Unavailable(format!("failed to read response from {}: {e}", self.model))
            }
        })?;

        Self::parse_text(&body)
    }
}
