use serde::Deserialize;

/// Main configuration structure for Sintegra-Queue
///
/// Every section is optional; missing sections and keys take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub status: StatusConfig,
    pub fetcher: FetcherConfig,
    pub persistence: PersistenceConfig,
}

/// Task queue configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Path to the SQLite file holding the queue
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Name of the queue within the file
    #[serde(rename = "queue-name")]
    pub queue_name: String,

    /// Fixed delay between broker connection attempts at worker startup (milliseconds)
    #[serde(rename = "connect-retry-delay-ms")]
    pub connect_retry_delay_ms: u64,

    /// How long a claimed message stays invisible before it is redelivered (seconds)
    #[serde(rename = "lease-timeout-secs")]
    pub lease_timeout_secs: u64,
}

/// Status store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Path to the SQLite file holding task statuses
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Lifetime of a status entry after its last write (seconds)
    #[serde(rename = "result-ttl-seconds")]
    pub result_ttl_seconds: u64,
}

/// Registry fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Base URL of the registry consultation pages, with a trailing slash
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-seconds")]
    pub request_timeout_seconds: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

/// Record sink configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Whether extracted records are upserted into the sink
    pub enabled: bool,

    /// Path to the SQLite file holding registrant records
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            database_path: "./pipeline.db".to_string(),
            queue_name: "scrape_tasks".to_string(),
            connect_retry_delay_ms: 5000,
            lease_timeout_secs: 300,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            database_path: "./pipeline.db".to_string(),
            result_ttl_seconds: 3600,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://appasp.sefaz.go.gov.br/sintegra/consulta/".to_string(),
            request_timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_path: "./registrants.db".to_string(),
        }
    }
}
