use serde::Serialize;

use crate::state::{CampaignState, FieldMap};

/// Events pushed to the client during one turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CampaignEvent {
    /// Assistant-visible text with markers already stripped.
    Text { delta: String },

    /// Fields newly confirmed this turn plus the full list still missing.
    State {
        partial_data: FieldMap,
        missing_fields: Vec<String>,
    },

    /// Emitted once, when every schema field is present.
    Complete { message: String, data: CampaignState },

    Error { message: String },
}

impl CampaignEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        CampaignEvent::Text {
            delta: delta.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        CampaignEvent::Error {
            message: message.into(),
        }
    }

    /// Terminal events close the push channel.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignEvent::Complete { .. } | CampaignEvent::Error { .. }
        )
    }
}
