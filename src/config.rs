//! Connector configuration
//!
//! Settings can come from environment variables (for the CLI) or from a
//! catalog-style property map handed over by the host engine.
//!
//! Environment variables:
//! - INFLUXQL_ENDPOINT: store URL, `http://` or `https://` (required)
//! - INFLUXQL_USERNAME / INFLUXQL_PASSWORD: credentials (required)
//! - INFLUXQL_CONNECT_TIMEOUT / INFLUXQL_WRITE_TIMEOUT / INFLUXQL_READ_TIMEOUT (default: 10s)
//! - INFLUXQL_KEEPALIVE: reuse HTTP connections (default: false)
//! - INFLUXQL_CACHE_EXPIRE: metadata cache time-to-live (default: 60s)
//! - INFLUXQL_CHUNK_SIZE: rows per result chunk, 0 for the server default (default: 0)
//! - INFLUXQL_CHUNK_POLL_TIMEOUT: max wait for the next result chunk (default: 10s)
//! - INFLUXQL_TLS_SKIP_VERIFY: accept any server certificate (default: false)

use crate::{Error, Result};

use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CACHE_EXPIRE: Duration = Duration::from_secs(60);

/// Property keys accepted by [`ConnectorConfig::from_properties`]
pub mod keys {
    pub const ENDPOINT: &str = "influxql.connect.endpoint";
    pub const USERNAME: &str = "influxql.connect.username";
    pub const PASSWORD: &str = "influxql.connect.password";
    pub const CONNECT_TIMEOUT: &str = "influxql.connect.connect-timeout";
    pub const WRITE_TIMEOUT: &str = "influxql.connect.write-timeout";
    pub const READ_TIMEOUT: &str = "influxql.connect.read-timeout";
    pub const KEEPALIVE: &str = "influxql.connect.keepalive";
    pub const TLS_SKIP_VERIFY: &str = "influxql.connect.tls-skip-verify";
    pub const CACHE_EXPIRE: &str = "influxql.cache.expire-duration";
    pub const CHUNK_SIZE: &str = "influxql.query.chunk-size";
    pub const CHUNK_POLL_TIMEOUT: &str = "influxql.query.chunk-poll-timeout";
}

/// Configuration for a connector session
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Store endpoint, e.g. `http://localhost:8086`
    pub endpoint: Url,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
    /// When false every request asks the server to close the connection
    pub keepalive: bool,
    /// Time-to-live of every metadata cache entry
    pub cache_expire: Duration,
    /// Rows per chunk for streamed queries; zero lets the server decide
    pub chunk_size: usize,
    /// How long a cursor waits for the next chunk before failing
    pub chunk_poll_timeout: Duration,
    /// Skip certificate verification on `https` endpoints
    pub tls_skip_verify: bool,
}

impl ConnectorConfig {
    /// Configuration with defaults for everything but the connection target
    pub fn new(endpoint: Url, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            endpoint,
            username: username.into(),
            password: password.into(),
            connect_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            keepalive: false,
            cache_expire: DEFAULT_CACHE_EXPIRE,
            chunk_size: 0,
            chunk_poll_timeout: DEFAULT_TIMEOUT,
            tls_skip_verify: false,
        }
    }

    /// Load configuration from `INFLUXQL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<&str, &str> = [
            ("INFLUXQL_ENDPOINT", keys::ENDPOINT),
            ("INFLUXQL_USERNAME", keys::USERNAME),
            ("INFLUXQL_PASSWORD", keys::PASSWORD),
            ("INFLUXQL_CONNECT_TIMEOUT", keys::CONNECT_TIMEOUT),
            ("INFLUXQL_WRITE_TIMEOUT", keys::WRITE_TIMEOUT),
            ("INFLUXQL_READ_TIMEOUT", keys::READ_TIMEOUT),
            ("INFLUXQL_KEEPALIVE", keys::KEEPALIVE),
            ("INFLUXQL_TLS_SKIP_VERIFY", keys::TLS_SKIP_VERIFY),
            ("INFLUXQL_CACHE_EXPIRE", keys::CACHE_EXPIRE),
            ("INFLUXQL_CHUNK_SIZE", keys::CHUNK_SIZE),
            ("INFLUXQL_CHUNK_POLL_TIMEOUT", keys::CHUNK_POLL_TIMEOUT),
        ]
        .into_iter()
        .collect();

        let mut properties = HashMap::new();
        for (var, key) in vars {
            if let Ok(value) = std::env::var(var) {
                properties.insert(key.to_string(), value);
            }
        }
        Self::from_properties(&properties)
    }

    /// Load configuration from catalog properties, see [`keys`]
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| property(properties, key);

        let endpoint = get(keys::ENDPOINT)
            .ok_or_else(|| Error::Config(format!("{} is required", keys::ENDPOINT)))?;
        let endpoint = Url::parse(endpoint)?;

        let mut config = Self::new(
            endpoint,
            get(keys::USERNAME).unwrap_or_default(),
            get(keys::PASSWORD).unwrap_or_default(),
        );

        if let Some(raw) = get(keys::CONNECT_TIMEOUT) {
            config.connect_timeout = parse_duration_value(keys::CONNECT_TIMEOUT, raw)?;
        }
        if let Some(raw) = get(keys::WRITE_TIMEOUT) {
            config.write_timeout = parse_duration_value(keys::WRITE_TIMEOUT, raw)?;
        }
        if let Some(raw) = get(keys::READ_TIMEOUT) {
            config.read_timeout = parse_duration_value(keys::READ_TIMEOUT, raw)?;
        }
        if let Some(raw) = get(keys::KEEPALIVE) {
            config.keepalive = parse_bool(keys::KEEPALIVE, raw)?;
        }
        if let Some(raw) = get(keys::TLS_SKIP_VERIFY) {
            config.tls_skip_verify = parse_bool(keys::TLS_SKIP_VERIFY, raw)?;
        }
        if let Some(raw) = get(keys::CACHE_EXPIRE) {
            config.cache_expire = parse_duration_value(keys::CACHE_EXPIRE, raw)?;
        }
        if let Some(raw) = get(keys::CHUNK_SIZE) {
            config.chunk_size = raw.parse().map_err(|e| {
                Error::Config(format!(
                    "{} must be a non-negative integer, got '{}': {}",
                    keys::CHUNK_SIZE,
                    raw,
                    e
                ))
            })?;
        }
        if let Some(raw) = get(keys::CHUNK_POLL_TIMEOUT) {
            config.chunk_poll_timeout = parse_duration_value(keys::CHUNK_POLL_TIMEOUT, raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check required settings
    pub fn validate(&self) -> Result<()> {
        match self.endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "endpoint scheme must be http or https, got '{}'",
                    other
                )))
            }
        }
        if self.endpoint.host_str().is_none() {
            return Err(Error::Config(format!(
                "endpoint {} has no host",
                self.endpoint
            )));
        }
        if self.username.trim().is_empty() {
            return Err(Error::Config(format!("{} cannot be blank", keys::USERNAME)));
        }
        if self.password.trim().is_empty() {
            return Err(Error::Config(format!("{} cannot be blank", keys::PASSWORD)));
        }
        if self.chunk_poll_timeout.is_zero() {
            return Err(Error::Config(format!(
                "{} must be greater than zero",
                keys::CHUNK_POLL_TIMEOUT
            )));
        }
        Ok(())
    }
}

fn property<'a>(properties: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_duration_value(key: &str, raw: &str) -> Result<Duration> {
    parse_duration::parse(raw)
        .map_err(|e| Error::Config(format!("{} must be a duration, got '{}': {}", key, raw, e)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} must be a boolean (true/false/1/0), got '{}'",
            key, raw
        ))),
    }
}
