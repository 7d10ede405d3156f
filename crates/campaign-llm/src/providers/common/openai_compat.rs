//! OpenAI-compatible request and stream-chunk helpers.
//!
//! Hosted OpenAI, DigitalOcean GenAI and most self-hosted gateways share the chat
//! completions wire shape.

use campaign_core::{ChatMessage, Role};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionChunk {
    Delta(String),
    Done,
}

pub fn messages_to_openai_compat_json(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({
                "role": role,
                "content": m.content,
            })
        })
        .collect()
}

/// Build a streaming chat request body.
pub fn build_openai_compat_body(
    model: &str,
    messages: &[ChatMessage],
    temperature: f32,
) -> Value {
    json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
        "temperature": temperature,
        "stream": true,
    })
}

#[derive(Debug, Deserialize)]
pub struct OpenAICompatStreamChunk {
    #[allow(dead_code)]
    id: Option<String>,
    choices: Vec<OpenAICompatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
    #[allow(dead_code)]
    role: Option<String>,
}

/// Content delta of the first choice; empty when the chunk carries none.
pub fn parse_openai_compat_chunk(chunk: OpenAICompatStreamChunk) -> CompletionChunk {
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();
    CompletionChunk::Delta(content)
}

/// Parse an SSE `data:` payload.
///
/// - `"[DONE]"` -> `CompletionChunk::Done`
/// - Invalid JSON -> error
pub fn parse_openai_compat_sse_data(data: &str) -> Result<CompletionChunk> {
    if data.trim() == "[DONE]" {
        return Ok(CompletionChunk::Done);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;
    Ok(parse_openai_compat_chunk(chunk))
}
