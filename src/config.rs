//! Env-driven configuration for the client.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binary. Defaults point at a local server with a generous timeout,
//! since a single generation request can run for minutes.
use std::env;
use std::time::Duration;

use crate::error::{SdError, SdResult};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7860";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    /// Read `SD_API_URL` and `SD_TIMEOUT_SECS`, falling back to defaults when unset.
    pub fn from_env() -> SdResult<Self> {
        let base_url = env::var("SD_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout = match env::var("SD_TIMEOUT_SECS") {
            Ok(raw) => parse_timeout(&raw)?,
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        tracing::debug!("Loaded client config: base_url={}, timeout={:?}", base_url, timeout);
        Ok(ClientConfig { base_url, timeout })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn parse_timeout(raw: &str) -> SdResult<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(SdError::Config("SD_TIMEOUT_SECS must be greater than zero".to_string())),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(SdError::Config(format!("SD_TIMEOUT_SECS is not a number: '{}'", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf = ClientConfig::default();
        assert_eq!(conf.base_url, "http://127.0.0.1:7860");
        assert_eq!(conf.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("600").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_timeout(" 42 ").unwrap(), Duration::from_secs(42));
        assert!(matches!(parse_timeout("0"), Err(SdError::Config(_))));
        assert!(matches!(parse_timeout("soon"), Err(SdError::Config(_))));
    }

    #[test]
    fn test_with_base_url() {
        let conf = ClientConfig::default().with_base_url("http://gpu-box:7861");
        assert_eq!(conf.base_url, "http://gpu-box:7861");
        assert_eq!(conf.timeout, Duration::from_secs(300));
    }
}
