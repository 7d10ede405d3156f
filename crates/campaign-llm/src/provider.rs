use async_trait::async_trait;
use campaign_core::ChatMessage;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, CompletionError>;

/// Lazy, ordered, non-restartable sequence of text deltas for one turn.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Begin a streaming chat completion.
    ///
    /// # Arguments
    /// * `messages` - Role-tagged conversation, system prompt first
    /// * `temperature` - Sampling temperature
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<CompletionStream>;
}
