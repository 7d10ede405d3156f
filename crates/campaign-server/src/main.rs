use std::io;

use clap::Parser;

use campaign_server::logging::init_logging;
use campaign_server::{run_server, Cli, ServerConfig};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    if cli.log_level.is_some() {
        env_logger::init();
    } else {
        init_logging(cli.debug);
    }

    let config = ServerConfig::from(cli);

    log::info!("Starting campaign server on port {}", config.port);
    log::info!("LLM Configuration:");
    log::info!("  Base URL: {}", config.llm_base_url);
    log::info!("  Model: {}", config.model);
    log::info!("  Temperature: {}", config.temperature);
    log::debug!("Session TTL: {}s", config.session_ttl.as_secs());

    run_server(config).await
}
