use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub plans_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub session_ttl_hours: i64,
    pub social_api_base_url: String,
    pub social_api_key: Option<String>,
    pub social_request_timeout_secs: u64,
    pub social_max_retries: u32,
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub billing_base_url: String,
    pub billing_api_key: Option<String>,
    pub billing_webhook_secret: Option<String>,
    pub geoip_base_url: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("plans_path", &self.plans_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("session_ttl_hours", &self.session_ttl_hours)
            .field("social_api_base_url", &self.social_api_base_url)
            .field(
                "social_api_key",
                &self.social_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "social_request_timeout_secs",
                &self.social_request_timeout_secs,
            )
            .field("social_max_retries", &self.social_max_retries)
            .field("llm_base_url", &self.llm_base_url)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("llm_model", &self.llm_model)
            .field("billing_base_url", &self.billing_base_url)
            .field(
                "billing_api_key",
                &self.billing_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "billing_webhook_secret",
                &self.billing_webhook_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("geoip_base_url", &self.geoip_base_url)
            .finish()
    }
}
