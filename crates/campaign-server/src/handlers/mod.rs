pub mod chat;
pub mod health;
pub mod session;
pub mod start;

use actix_web::HttpResponse;
use campaign_core::StoreError;

/// JSON endpoints answer store outages with 503.
pub(crate) fn store_unavailable(session_id: &str, err: StoreError) -> HttpResponse {
    log::error!("[{}] {}", session_id, err);
    HttpResponse::ServiceUnavailable().json(serde_json::json!({
        "error": err.to_string()
    }))
}
