// Runtime configuration for the binary, read from the environment (and a
// `.env` file when present). Every variable is optional.

use crate::api::{ClientConfig, ClientError};
use crate::verification::PollConfig;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BOOKING_PAGE_URL: &str = "http://localhost:8080/book.html";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub poll: PollConfig,
    // Location the wizard pretends to be served from
    pub booking_page_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            poll: PollConfig::default(),
            booking_page_url: DEFAULT_BOOKING_PAGE_URL.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        dotenv().ok();
        let config = Self::from_lookup(|name| env::var(name).ok())?;
        tracing::debug!(base_url = %config.client.base_url, "configuration loaded");
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup("BOOKING_API_BASE_URL") {
            config.client.base_url = base_url;
        }
        if let Some(timeout_ms) = parse_var::<u64, _>(&lookup, "BOOKING_REQUEST_TIMEOUT_MS")? {
            config.client.timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = parse_var::<u64, _>(&lookup, "BOOKING_POLL_INTERVAL_MS")? {
            config.poll.interval = Duration::from_millis(interval_ms);
        }
        if let Some(max_attempts) = parse_var::<u32, _>(&lookup, "BOOKING_POLL_MAX_ATTEMPTS")? {
            config.poll.max_attempts = max_attempts;
        }
        if let Some(page_url) = lookup("BOOKING_PAGE_URL") {
            config.booking_page_url = page_url;
        }

        if config.client.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "BOOKING_REQUEST_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        if config.poll.max_attempts == 0 {
            return Err(ClientError::ConfigError(
                "BOOKING_POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ClientError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ClientError::ConfigError(format!("Invalid {} '{}': {}", name, raw, e))),
    }
}
