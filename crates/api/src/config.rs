use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub redis_url: String,
    /// Salt mixed into address hashes. Rotating it orphans anonymous identities.
    pub ip_hash_salt: String,
    /// Auth provider endpoint that resolves a bearer token to a user.
    pub auth_verify_url: String,
    pub auth_api_key: String,
    /// LLM chat-completions endpoint.
    #[serde(default = "default_llm_api_url")]
    pub llm_api_url: String,
    pub llm_api_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Social content search API base URL.
    #[serde(default = "default_social_api_url")]
    pub social_api_url: String,
    /// Requests allowed per window, enforced per identity and per address.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: i64,
    #[serde(default = "default_rate_limit_window_hours")]
    pub rate_limit_window_hours: i64,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking.
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

fn default_llm_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_social_api_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_rate_limit_max() -> i64 {
    10
}

fn default_rate_limit_window_hours() -> i64 {
    24
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn rate_limit_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.rate_limit_window_hours)
    }
}
