pub mod config;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use config::{Cli, ServerConfig};
pub use server::{configure, run_server, spawn_expiry_sweeper};
pub use state::AppState;
