use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use uuid::Uuid;

use super::store_unavailable;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: String,
    pub chat_id: String,
}

/// Mint a session with an empty backing state.
pub async fn handler(state: web::Data<AppState>) -> impl Responder {
    let session_id = Uuid::new_v4().to_string();
    let chat_id = Uuid::new_v4().to_string();

    if let Err(e) = state.store.get(&session_id).await {
        return store_unavailable(&session_id, e);
    }

    log::info!("[{}] Session started (chat {})", session_id, chat_id);
    HttpResponse::Created().json(StartResponse {
        session_id,
        chat_id,
    })
}
