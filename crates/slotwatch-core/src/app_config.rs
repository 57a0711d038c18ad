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

impl Environment {
    /// Only production insists on an `https://` API root; the other
    /// environments may point at a local mock server.
    #[must_use]
    pub fn requires_https(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub session_cookie: String,
    pub application_key: String,
    pub application_name: String,
    pub base_url: String,
    pub organization_id: i64,
    pub service_type_id: i64,
    pub preferences_path: PathBuf,
    pub locations_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub poll_interval_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("session_cookie", &"[redacted]")
            .field("application_key", &"[redacted]")
            .field("application_name", &self.application_name)
            .field("base_url", &self.base_url)
            .field("organization_id", &self.organization_id)
            .field("service_type_id", &self.service_type_id)
            .field("preferences_path", &self.preferences_path)
            .field("locations_path", &self.locations_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .finish()
    }
}
