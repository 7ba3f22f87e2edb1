// ABOUTME: Service configuration read from the environment
// ABOUTME: Validates values up front so the server never starts half-configured

use std::env;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use evald_config::{constants, defaults};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(&'static str),
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("Invalid URL in {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub redis_url: String,
    /// Explicit base URL for workers; derived from the port when unset
    pub public_url: Option<Url>,
    pub script_ttl: Duration,
    pub execution_timeout: Duration,
    pub deno_path: PathBuf,
    pub max_heap_mb: u32,
    pub max_code_bytes: usize,
    pub max_message_bytes: usize,
    pub deny_net: Vec<String>,
    /// Fixed CORS origin; the request origin is reflected when unset
    pub cors_origin: Option<String>,
}

/// Non-empty value of an environment variable
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn positive<T: PartialEq + Default>(name: &'static str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Zero(name));
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match var(constants::PORT) {
            Some(port_str) => port_str.parse::<u16>()?,
            None => defaults::PORT,
        };

        // Validate port is in valid range
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let host = var(constants::HOST).unwrap_or_else(|| defaults::HOST.to_string());

        let redis_url = var(constants::REDIS_URL).ok_or(ConfigError::MissingVar(constants::REDIS_URL))?;
        Url::parse(&redis_url).map_err(|e| ConfigError::InvalidUrl {
            name: constants::REDIS_URL,
            reason: e.to_string(),
        })?;

        let public_url = var(constants::EVALD_PUBLIC_URL)
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
                    name: constants::EVALD_PUBLIC_URL,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let script_ttl_secs = positive(
            constants::EVALD_SCRIPT_TTL_SECS,
            parse_var(constants::EVALD_SCRIPT_TTL_SECS, defaults::SCRIPT_TTL_SECS)?,
        )?;
        let execution_timeout_ms = positive(
            constants::EVALD_EXECUTION_TIMEOUT_MS,
            parse_var(constants::EVALD_EXECUTION_TIMEOUT_MS, defaults::EXECUTION_TIMEOUT_MS)?,
        )?;
        let max_heap_mb = positive(
            constants::EVALD_MAX_HEAP_MB,
            parse_var(constants::EVALD_MAX_HEAP_MB, defaults::MAX_HEAP_MB)?,
        )?;
        let max_code_bytes = positive(
            constants::EVALD_MAX_CODE_BYTES,
            parse_var(constants::EVALD_MAX_CODE_BYTES, defaults::MAX_CODE_BYTES)?,
        )?;
        let max_message_bytes = positive(
            constants::EVALD_MAX_MESSAGE_BYTES,
            parse_var(constants::EVALD_MAX_MESSAGE_BYTES, defaults::MAX_MESSAGE_BYTES)?,
        )?;

        let deno_path = var(constants::EVALD_DENO_PATH)
            .unwrap_or_else(|| defaults::DENO_PATH.to_string())
            .into();

        // Parse denied worker hosts from environment
        let deny_net = var(constants::EVALD_DENY_NET)
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let cors_origin = var(constants::CORS_ORIGIN);

        Ok(Config {
            port,
            host,
            redis_url,
            public_url,
            script_ttl: Duration::from_secs(script_ttl_secs),
            execution_timeout: Duration::from_millis(execution_timeout_ms),
            deno_path,
            max_heap_mb,
            max_code_bytes,
            max_message_bytes,
            deny_net,
            cors_origin,
        })
    }

    pub fn with_port(mut self, port: u16) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }
        self.port = port;
        Ok(self)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Base URL workers fetch staged scripts from
    pub fn public_url(&self) -> Result<Url, ConfigError> {
        match &self.public_url {
            Some(url) => Ok(url.clone()),
            None => Url::parse(&format!("http://127.0.0.1:{}/", self.port)).map_err(|e| {
                ConfigError::InvalidUrl {
                    name: constants::EVALD_PUBLIC_URL,
                    reason: e.to_string(),
                }
            }),
        }
    }

    /// Hosts workers may not reach: the configured list, the Redis endpoint
    /// and evald's own listener. Local endpoints are denied under every
    /// loopback alias.
    pub fn worker_deny_net(&self) -> Vec<String> {
        let mut hosts = self.deny_net.clone();

        if let Ok(url) = Url::parse(&self.redis_url) {
            if let Some(host) = url.host_str() {
                deny_endpoint(&mut hosts, host, url.port().unwrap_or(6379));
            }
        }

        // Workers fetch their own staged wrapper as the main module, which
        // is not subject to these rules; anything they request later is.
        if let Ok(url) = self.public_url() {
            if let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) {
                deny_endpoint(&mut hosts, host, port);
            }
        }
        let listen_host = if is_unspecified(&self.host) {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        deny_endpoint(&mut hosts, listen_host, self.port);

        hosts
    }
}

fn deny_endpoint(hosts: &mut Vec<String>, host: &str, port: u16) {
    let aliases: &[&str] = if is_loopback(host) {
        &["localhost", "127.0.0.1", "[::1]"]
    } else {
        &[host]
    };
    for alias in aliases {
        let entry = format!("{}:{}", alias, port);
        if !hosts.contains(&entry) {
            hosts.push(entry);
        }
    }
}

fn is_unspecified(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1")
}
