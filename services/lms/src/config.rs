use serde::Deserialize;

use ednova_core::config::Config;

fn default_max_connections() -> u32 {
    10
}

fn default_health_interval_secs() -> u64 {
    30
}

fn default_port() -> u16 {
    5000
}

fn default_session_ttl_secs() -> u64 {
    ednova_auth_types::cookie::SESSION_TTL_SECS
}

fn default_currency() -> String {
    "pkr".to_owned()
}

/// LMS service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct LmsConfig {
    /// Postgres server URL without a database name, e.g. `postgres://lms:pw@db:5432`.
    /// Each tenant lives in the database `{base}/{tenant}`.
    pub tenant_database_base_url: String,
    /// Optional comma-separated list of tenants this instance serves.
    #[serde(default)]
    pub tenant_allow_list: Option<String>,
    /// Pool size per tenant database.
    #[serde(default = "default_max_connections")]
    pub tenant_max_connections: u32,
    /// Seconds between liveness sweeps of cached tenant connections.
    #[serde(default = "default_health_interval_secs")]
    pub tenant_health_interval_secs: u64,
    #[serde(default = "default_port")]
    pub lms_port: u16,
    /// HMAC secret for session tokens.
    pub session_secret: String,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub cookie_domain: Option<String>,
    /// Public URL of the web front end, used for payment redirects and mail links.
    pub front_url: String,
    pub payment_api_url: String,
    pub payment_api_key: String,
    #[serde(default = "default_currency")]
    pub payment_currency: String,
    pub storage_api_url: String,
    pub storage_api_key: String,
    pub storage_public_url: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
}

impl Config for LmsConfig {}

impl LmsConfig {
    /// Parsed allow-list entries, trimmed, empty entries dropped.
    pub fn allow_list(&self) -> Option<Vec<String>> {
        self.tenant_allow_list.as_ref().map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
    }
}
