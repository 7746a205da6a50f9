use std::path::PathBuf;

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Upper bound on notifications requested per poll.
    pub page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "notification-aggregator/0.1".to_string(),
            timeout_seconds: 10,
            max_retries: 1,
            retry_delay_ms: 1000,
            page_size: 50,
        }
    }
}

#[derive(Clone)]
pub struct GithubConfig {
    pub api_base: String,
    pub token: String,
    pub username: String,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    /// Delivery is disabled when no token is configured.
    pub bot_token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_TELEGRAM_API.to_string(),
            bot_token: None,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to persist {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
