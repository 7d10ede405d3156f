pub mod config;
pub mod prompt;
pub mod turn;

pub use config::TurnConfig;
pub use turn::{run_turn, TurnOutcome, TurnRequest};
