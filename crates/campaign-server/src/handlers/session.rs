use actix_web::{web, HttpResponse, Responder};
use campaign_core::CampaignState;
use serde::Serialize;

use super::store_unavailable;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub state: CampaignState,
    pub missing_fields: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub session_id: String,
    pub cancelled_turn: bool,
}

/// Snapshot of a session's collected fields. Unknown sessions are not created.
pub async fn get(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();

    match state.store.peek(&session_id).await {
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Session not found",
            "session_id": session_id,
        })),
        Ok(Some(snapshot)) => HttpResponse::Ok().json(SessionResponse {
            missing_fields: snapshot.missing_fields(),
            complete: snapshot.is_complete(),
            state: snapshot,
            session_id,
        }),
        Err(e) => store_unavailable(&session_id, e),
    }
}

/// Stop any streaming turn and drop the session. Deleting twice is fine.
pub async fn delete(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();

    let cancelled_turn = state.cancel_turn(&session_id).await;
    if let Err(e) = state.store.delete(&session_id).await {
        return store_unavailable(&session_id, e);
    }

    log::info!(
        "[{}] Session deleted (cancelled in-flight turn: {})",
        session_id,
        cancelled_turn
    );
    HttpResponse::Ok().json(DeleteResponse {
        session_id,
        cancelled_turn,
    })
}
