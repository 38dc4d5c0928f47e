use std::{
    env,
    net::{AddrParseError, SocketAddr},
};

use thiserror::Error;

use crate::labels::service::LabelPolicyConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub service_name: String,
    pub bind_addr: SocketAddr,
    pub send_timeout_ms: u64,
    pub seed_on_connect: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid GATEWAY_BIND_ADDR: {0}")]
    BindAddrParse(#[from] AddrParseError),
    #[error("invalid GATEWAY_SEND_TIMEOUT_MS: {0}")]
    InvalidSendTimeoutMs(String),
    #[error("invalid GATEWAY_SEED_ON_CONNECT: {0}")]
    InvalidSeedOnConnect(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let service_name =
            lookup("GATEWAY_SERVICE_NAME").unwrap_or_else(|| "labels-gateway".to_string());
        let bind_addr = lookup("GATEWAY_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:4200".to_string())
            .parse()?;
        let send_timeout_ms =
            parse_with_lookup(&lookup, "GATEWAY_SEND_TIMEOUT_MS", 10_000, |raw| {
                raw.parse::<u64>()
                    .map_err(|error| ConfigError::InvalidSendTimeoutMs(error.to_string()))
                    .map(|value| value.clamp(250, 120_000))
            })?;
        let seed_on_connect = parse_with_lookup(&lookup, "GATEWAY_SEED_ON_CONNECT", true, |raw| {
            parse_bool(&raw).map_err(ConfigError::InvalidSeedOnConnect)
        })?;

        Ok(Self {
            service_name,
            bind_addr,
            send_timeout_ms,
            seed_on_connect,
        })
    }

    pub fn label_policy(&self) -> LabelPolicyConfig {
        LabelPolicyConfig {
            send_timeout_ms: self.send_timeout_ms,
        }
    }
}

fn parse_with_lookup<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parser: impl FnOnce(String) -> Result<T, ConfigError>,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => parser(raw),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(other.to_string()),
    }
}
