use async_trait::async_trait;
use campaign_core::ChatMessage;
use reqwest::Client;

use crate::provider::{CompletionError, CompletionProvider, CompletionStream, Result};

use super::common::openai_compat::{build_openai_compat_body, parse_openai_compat_sse_data};
use super::common::sse::completion_stream_from_sse;

pub const DEFAULT_MODEL: &str = "llama-3-8b-instruct";

/// Streaming client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<CompletionStream> {
        let body = build_openai_compat_body(&self.model, messages, temperature);

        log::debug!(
            "Requesting completion: model={}, messages={}, temperature={}",
            self.model,
            messages.len(),
            temperature
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(CompletionError::Api(format!("HTTP {}: {}", status, text)));
        }

        let stream = completion_stream_from_sse(response, parse_openai_compat_sse_data);

        Ok(stream)
    }
}
