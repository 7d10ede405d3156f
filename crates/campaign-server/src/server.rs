use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use campaign_core::MemorySessionStore;

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;

/// Upper bound on how long an expired session lingers before the sweeper evicts it.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Register every route under `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route(
                "/campaign-chat/start",
                web::post().to(handlers::start::handler),
            )
            .route("/campaign-chat", web::post().to(handlers::chat::handler))
            .route(
                "/campaign-chat/sessions/{session_id}",
                web::get().to(handlers::session::get),
            )
            .route(
                "/campaign-chat/sessions/{session_id}",
                web::delete().to(handlers::session::delete),
            )
            .route("/health", web::get().to(handlers::health::handler)),
    );
}

pub async fn run_server(config: ServerConfig) -> io::Result<()> {
    log::info!(
        "Initializing server with base URL: {}, model: {}",
        config.llm_base_url,
        config.model
    );

    let (state, store) = AppState::from_config(&config);
    let sweep_every = config.session_ttl.min(MAX_SWEEP_INTERVAL);
    let _sweeper = spawn_expiry_sweeper(store, sweep_every);

    let state = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(configure)
    })
    .bind(format!("0.0.0.0:{}", config.port))?
    .run()
    .await
}

/// Periodically evict sessions idle past the store's TTL.
pub fn spawn_expiry_sweeper(
    store: Arc<MemorySessionStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = store.purge_expired();
            if evicted > 0 {
                log::info!(
                    "Evicted {} idle session(s), {} remaining",
                    evicted,
                    store.len()
                );
            }
        }
    })
}
