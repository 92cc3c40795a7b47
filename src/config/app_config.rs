use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::domain::cache::{
    HeaderExclusions, DEFAULT_EXCLUDED_HEADERS, DEFAULT_VOLATILE_HEADERS,
};
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheConfig;
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::upstream::UpstreamClientConfig;

const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub proxy: ProxySettings,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Forwarding behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Upstream timeout in seconds, connect through body
    pub timeout_secs: f64,
    /// Largest accepted inbound body in bytes
    pub max_body_size: usize,
    /// Headers stripped before forwarding and before hashing
    #[serde(deserialize_with = "header_list")]
    pub excluded_headers: Vec<String>,
    /// Extra headers ignored when hashing but still forwarded
    #[serde(deserialize_with = "header_list")]
    pub volatile_headers: Vec<String>,
    /// Cap on concurrent upstream requests, and so on open connections
    pub max_connections: usize,
    pub pool_max_idle_per_host: usize,
    pub follow_redirects: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_body_size: 10 * 1024 * 1024,
            excluded_headers: to_strings(DEFAULT_EXCLUDED_HEADERS),
            volatile_headers: to_strings(DEFAULT_VOLATILE_HEADERS),
            max_connections: 100,
            pool_max_idle_per_host: 32,
            follow_redirects: true,
        }
    }
}

impl ProxySettings {
    /// Headers never sent upstream
    pub fn forward_exclusions(&self) -> HeaderExclusions {
        HeaderExclusions::new(&self.excluded_headers)
    }

    /// Headers left out of the cache key
    pub fn key_exclusions(&self) -> HeaderExclusions {
        self.forward_exclusions()
            .union(&HeaderExclusions::new(&self.volatile_headers))
    }

    /// Upstream timeout; out-of-range values, rejected by `validate`, fall back to the default
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    pub fn client_config(&self) -> UpstreamClientConfig {
        UpstreamClientConfig {
            timeout: self.timeout(),
            max_connections: self.max_connections,
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            follow_redirects: self.follow_redirects,
        }
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Accepts either a list or a comma-separated string
fn header_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    let names = match Raw::deserialize(deserializer)? {
        Raw::List(list) => list,
        Raw::Csv(csv) => csv.split(',').map(str::to_string).collect(),
    };

    Ok(names
        .into_iter()
        .map(|n| n.trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
        .collect())
}

impl AppConfig {
    /// Loads `config/default`, `config/local` and `APP__*` variables, then validates
    pub fn load() -> Result<Self, DomainError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self, DomainError> {
        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Rejects values the server cannot start with
    pub fn validate(&self) -> Result<(), DomainError> {
        let timeout_secs = self.proxy.timeout_secs;
        if !(timeout_secs > 0.0 && timeout_secs <= MAX_TIMEOUT_SECS) {
            return Err(DomainError::configuration(format!(
                "proxy.timeout_secs must be greater than zero and at most {}",
                MAX_TIMEOUT_SECS
            )));
        }

        if self.proxy.max_connections == 0 {
            return Err(DomainError::configuration(
                "proxy.max_connections must be greater than zero",
            ));
        }

        if self.proxy.max_body_size == 0 {
            return Err(DomainError::configuration(
                "proxy.max_body_size must be greater than zero",
            ));
        }

        self.cache.validate()
    }
}
