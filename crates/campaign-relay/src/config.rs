pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_COMPLETION_MESSAGE: &str = "Campaign details captured successfully.";

/// Configuration for one turn.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub temperature: f32,
    /// Replaces the schema-generated preamble of the system prompt.
    pub system_prompt: Option<String>,
    /// Message carried by the `complete` event.
    pub completion_message: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
            completion_message: DEFAULT_COMPLETION_MESSAGE.to_string(),
        }
    }
}
