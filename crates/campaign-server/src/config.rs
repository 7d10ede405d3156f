use std::time::Duration;

use clap::Parser;

use campaign_llm::providers::openai::DEFAULT_MODEL;
use campaign_relay::config::DEFAULT_TEMPERATURE;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_LLM_BASE_URL: &str = "https://inference.do-ai.run/v1";
pub const DEFAULT_SESSION_TTL_MINUTES: u64 = 60;

#[derive(Parser, Debug, Clone)]
#[command(name = "campaign-server")]
#[command(about = "Campaign chat relay server")]
#[command(version)]
pub struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    #[arg(long, env = "DO_GENAI_BASE_URL", hide = true)]
    pub genai_base_url: Option<String>,

    /// LLM model name
    #[arg(long, env = "LLM_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "DO_GENAI_MODEL", hide = true)]
    pub genai_model: Option<String>,

    /// LLM API key
    #[arg(long, env = "LLM_API_KEY")]
    pub api_key: Option<String>,

    #[arg(long, env = "DO_GENAI_API_KEY", hide = true)]
    pub genai_api_key: Option<String>,

    /// Sampling temperature for campaign turns
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Idle minutes before an untouched session is evicted
    #[arg(long, env = "SESSION_TTL_MINUTES", default_value_t = DEFAULT_SESSION_TTL_MINUTES)]
    pub session_ttl_minutes: u64,

    /// Log level (overrides debug flag)
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,
}

/// Resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub llm_base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub session_ttl: Duration,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_MINUTES * 60),
            debug: false,
        }
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        let defaults = ServerConfig::default();
        Self {
            port: cli.port,
            llm_base_url: cli
                .llm_base_url
                .or(cli.genai_base_url)
                .unwrap_or(defaults.llm_base_url),
            model: cli.model.or(cli.genai_model).unwrap_or(defaults.model),
            api_key: cli.api_key.or(cli.genai_api_key).unwrap_or_default(),
            temperature: cli.temperature,
            session_ttl: Duration::from_secs(cli.session_ttl_minutes.max(1) * 60),
            debug: cli.debug,
        }
    }
}
