use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use campaign_core::{CampaignEvent, CampaignSchema, MemorySessionStore, SessionStore};
use campaign_llm::{CompletionProvider, OpenAIProvider};
use campaign_relay::TurnConfig;

use crate::config::ServerConfig;

/// Handle on a turn that is still streaming.
#[derive(Debug, Clone)]
pub struct ActiveTurn {
    pub turn_id: String,
    pub cancel_token: CancellationToken,
}

impl ActiveTurn {
    pub fn new() -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            cancel_token: CancellationToken::new(),
        }
    }
}

impl Default for ActiveTurn {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub llm: Arc<dyn CompletionProvider>,
    pub turn_config: TurnConfig,
    pub active_turns: Arc<RwLock<HashMap<String, ActiveTurn>>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn CompletionProvider>,
        turn_config: TurnConfig,
    ) -> Self {
        Self {
            store,
            llm,
            turn_config,
            active_turns: Arc::new(RwLock::new(HashMap::new())),
            started_at: Instant::now(),
        }
    }

    /// Build the in-memory store and the OpenAI-compatible provider from config.
    ///
    /// The concrete store is returned as well so the caller can drive expiry.
    pub fn from_config(config: &ServerConfig) -> (Self, Arc<MemorySessionStore>) {
        log::info!(
            "Creating LLM provider with base URL: {} and model: {}",
            config.llm_base_url,
            config.model
        );
        if config.api_key.is_empty() {
            log::warn!("No LLM API key configured; upstream requests will likely be rejected");
        }

        let llm: Arc<dyn CompletionProvider> = Arc::new(
            OpenAIProvider::new(config.api_key.clone())
                .with_base_url(config.llm_base_url.clone())
                .with_model(config.model.clone()),
        );

        let store = Arc::new(
            MemorySessionStore::new(CampaignSchema::default()).with_idle_ttl(config.session_ttl),
        );
        log::info!(
            "Session store ready (idle TTL: {}s)",
            config.session_ttl.as_secs()
        );

        let turn_config = TurnConfig {
            temperature: config.temperature,
            ..Default::default()
        };

        (Self::new(store.clone(), llm, turn_config), store)
    }

    /// Register a new turn for the session, replacing any previous handle.
    pub async fn begin_turn(&self, session_id: &str) -> ActiveTurn {
        let turn = ActiveTurn::new();
        let mut turns = self.active_turns.write().await;
        if turns.insert(session_id.to_string(), turn.clone()).is_some() {
            log::warn!(
                "[{}] Another turn is already streaming for this session",
                session_id
            );
        }
        turn
    }

    /// Drop the handle, unless a newer turn has taken its place.
    pub async fn end_turn(&self, session_id: &str, turn_id: &str) {
        let mut turns = self.active_turns.write().await;
        if turns
            .get(session_id)
            .is_some_and(|active| active.turn_id == turn_id)
        {
            turns.remove(session_id);
        }
    }

    /// Cancel and forget the session's streaming turn. Returns whether one existed.
    pub async fn cancel_turn(&self, session_id: &str) -> bool {
        let mut turns = self.active_turns.write().await;
        match turns.remove(session_id) {
            Some(active) => {
                active.cancel_token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Forward events as SSE frames until a terminal event or until the client goes away.
pub fn spawn_sse_sender(
    mut rx: mpsc::Receiver<CampaignEvent>,
    tx: mpsc::Sender<actix_web::web::Bytes>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let event_json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };

            let bytes = actix_web::web::Bytes::from(format!("data: {}\n\n", event_json));
            if tx.send(bytes).await.is_err() {
                break;
            }

            if event.is_terminal() {
                break;
            }
        }
    })
}
