//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Agent / Gemini configuration
    pub agent: AgentConfig,
    /// PubMed configuration
    pub pubmed: PubmedConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Agent and Gemini provider configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Gemini API key. Missing key is surfaced as a degraded response at
    /// request time, not a startup failure.
    pub gemini_api_key: Option<String>,
    /// Gemini API base URL
    pub gemini_base_url: String,
    /// Primary model (higher quality, lower rate limit)
    pub primary_model: String,
    /// Fallback model (lower quality, higher rate limit)
    pub fallback_model: String,
    /// Per-call timeout for provider requests
    pub request_timeout: Duration,
    /// How long a rate-limited model stays excluded from selection
    pub quota_cooldown: Duration,
    /// Attempts per candidate model within one exchange
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_base_delay: Duration,
    /// Upper bound for the exponential part of the backoff
    pub retry_max_delay: Duration,
    /// Hard cap on tool-calling rounds within one exchange
    pub max_tool_rounds: usize,
}

/// PubMed E-utilities configuration
#[derive(Debug, Clone)]
pub struct PubmedConfig {
    /// E-utilities base URL
    pub base_url: String,
    /// Optional API key (raises NCBI rate limits)
    pub api_key: Option<String>,
    /// Optional contact e-mail, forwarded to NCBI
    pub email: Option<String>,
    /// Per-call timeout for PubMed requests
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(3000),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            agent: AgentConfig {
                gemini_api_key: non_empty_env("GEMINI_API_KEY"),
                gemini_base_url: env::var("GEMINI_API_BASE_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                primary_model: env::var("GEMINI_PRIMARY_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-pro".to_string()),
                fallback_model: env::var("GEMINI_FALLBACK_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
                request_timeout: duration_env_secs("GEMINI_TIMEOUT_SECS", 30),
                quota_cooldown: duration_env_secs("QUOTA_COOLDOWN_SECS", 60),
                max_retries: env::var("GEMINI_MAX_RETRIES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2),
                retry_base_delay: Duration::from_millis(1000),
                retry_max_delay: Duration::from_millis(10_000),
                max_tool_rounds: 5,
            },
            pubmed: PubmedConfig {
                base_url: env::var("PUBMED_BASE_URL")
                    .unwrap_or_else(|_| "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()),
                api_key: non_empty_env("PUBMED_API_KEY"),
                email: non_empty_env("PUBMED_EMAIL"),
                timeout: duration_env_secs("PUBMED_TIMEOUT_SECS", 10),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn duration_env_secs(key: &str, default_secs: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
