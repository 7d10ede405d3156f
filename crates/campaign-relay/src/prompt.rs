//! System prompt construction.

use campaign_core::{CampaignSchema, CampaignState, ChatMessage, MARKER_TAG};

use crate::config::TurnConfig;

/// Instructions asking the model to gather every schema field and to mark
/// confirmed values inline.
pub fn build_system_prompt(schema: &CampaignSchema) -> String {
    let mut prompt = String::from(
        "You are an expert digital marketing assistant helping a user define a new marketing campaign.\n\
         Your goal is to gather specific information through natural conversation to build a campaign profile.\n\n",
    );

    prompt.push_str(&format!(
        "You need to collect the following {} pieces of information:\n",
        schema.len()
    ));
    for (index, field) in schema.fields().iter().enumerate() {
        prompt.push_str(&format!(
            "{}. **{}**: {}\n",
            index + 1,
            field.name,
            field.description
        ));
    }

    prompt.push_str(
        "\n**Instructions:**\n\
         - Engage in natural conversation to extract this information\n\
         - Ask clarifying questions when needed, grouping related questions instead of asking one at a time\n\
         - Be concise and professional\n\
         - Do not hallucinate or assume information not provided\n\n",
    );

    prompt.push_str(&marking_instructions(schema));
    prompt
}

fn marking_instructions(schema: &CampaignSchema) -> String {
    let mut text = format!(
        "**IMPORTANT - Marking extracted information:**\n\
         When you have HIGH CONFIDENCE that the user has provided a specific piece of information, \
         mark it in your response using this exact format:\n\n\
         {MARKER_TAG}field_name:value]\n\nExamples:\n"
    );
    for field in schema.fields() {
        text.push_str(&format!("{MARKER_TAG}{}:{}]\n", field.name, field.example));
    }
    text.push_str(
        "\nOnly emit a FIELD marker when you are certain about the value. Never guess.\n\
         After marking a field, continue your conversational response naturally.\n",
    );
    text
}

/// What is already known, or `None` while nothing has been collected.
pub fn build_context_block(state: &CampaignState) -> Option<String> {
    if state.collected_count() == 0 {
        return None;
    }

    let snapshot = serde_json::to_string_pretty(state).unwrap_or_default();
    Some(format!(
        "Current campaign information collected so far:\n{}\n\nStill needed: {}",
        snapshot,
        state.missing_fields().join(", ")
    ))
}

/// Conversation for one turn: system prompt (plus context) and the user message.
pub fn build_messages(
    schema: &CampaignSchema,
    state: &CampaignState,
    user_message: &str,
    config: &TurnConfig,
) -> Vec<ChatMessage> {
    let mut system = match config.system_prompt.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ => build_system_prompt(schema),
    };

    if let Some(context) = build_context_block(state) {
        system.push_str("\n\n");
        system.push_str(&context);
    }

    vec![ChatMessage::system(system), ChatMessage::user(user_message)]
}
