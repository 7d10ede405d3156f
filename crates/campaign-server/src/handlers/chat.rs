use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tokio::sync::mpsc;

use campaign_core::CampaignEvent;
use campaign_relay::{run_turn, TurnOutcome, TurnRequest};

use crate::logging::Timer;
use crate::state::{spawn_sse_sender, AppState};

const EVENT_BUFFER: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, rename = "sessionId", alias = "session_id")]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

impl ChatRequest {
    fn validate(&self) -> Result<(), &'static str> {
        if self.session_id.trim().is_empty() {
            return Err("sessionId is required");
        }
        if self.message.trim().is_empty() {
            return Err("message is required");
        }
        Ok(())
    }
}

/// Run one campaign turn and stream its events as SSE.
pub async fn handler(state: web::Data<AppState>, req: web::Json<ChatRequest>) -> impl Responder {
    let req = req.into_inner();
    if let Err(reason) = req.validate() {
        log::warn!("Rejected campaign chat request: {}", reason);
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": reason }));
    }

    let session_id = req.session_id.trim().to_string();
    log::info!("[{}] Campaign chat turn requested", session_id);

    let (sse_tx, mut sse_rx) = mpsc::channel::<web::Bytes>(EVENT_BUFFER);
    let (event_tx, event_rx) = mpsc::channel::<CampaignEvent>(EVENT_BUFFER);
    let _sse_handle = spawn_sse_sender(event_rx, sse_tx);

    let turn = state.begin_turn(&session_id).await;
    let state = state.get_ref().clone();
    let request = TurnRequest {
        session_id: session_id.clone(),
        message: req.message,
    };

    tokio::spawn(async move {
        let timer = Timer::new(format!("campaign turn {}", turn.turn_id));

        let result = run_turn(
            &request,
            state.store.as_ref(),
            state.llm.as_ref(),
            &event_tx,
            &turn.cancel_token,
            &state.turn_config,
        )
        .await;

        match result {
            Ok(TurnOutcome::Completed(_)) => {
                log::info!("[{}] Campaign handed off", session_id);
            }
            Ok(TurnOutcome::Exhausted { missing_fields }) => {
                log::info!(
                    "[{}] Turn ended with {} field(s) missing",
                    session_id,
                    missing_fields.len()
                );
            }
            // Already logged and reported by the orchestrator.
            Err(_) => {}
        }

        drop(event_tx);
        timer.debug(&session_id);
        state.end_turn(&session_id, &turn.turn_id).await;
    });

    HttpResponse::Ok()
        .append_header((header::CONTENT_TYPE, "text/event-stream"))
        .append_header((header::CACHE_CONTROL, "no-cache"))
        .append_header((header::CONNECTION, "keep-alive"))
        .append_header(("X-Accel-Buffering", "no"))
        .streaming(async_stream::stream! {
            while let Some(item) = sse_rx.recv().await {
                yield Ok::<_, actix_web::Error>(item);
            }
        })
}
