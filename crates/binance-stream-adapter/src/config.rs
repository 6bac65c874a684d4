/*
[INPUT]:  Stream base address, dial timeout and buffer sizing
[OUTPUT]: Validated StreamConfig passed explicitly to StreamClient
[POS]:    Configuration layer - per-client settings (no process-wide state)
[UPDATE]: When adding connection options or changing defaults
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StreamError};

/// Default raw stream base address
pub const DEFAULT_BASE_URL: &str = "wss://stream.binance.com:9443/ws";

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RAW_BUFFER: usize = 1024;

/// Stream client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Base address every endpoint suffix is appended to
    pub base_url: String,
    /// Upper bound on the websocket dial, in milliseconds
    pub connect_timeout_ms: u64,
    /// Raw messages buffered between the socket reader and the dispatch loop
    pub raw_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            raw_buffer: DEFAULT_RAW_BUFFER,
        }
    }
}

impl StreamConfig {
    /// Create a config pointing at a different base address
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let config = Self {
            base_url: base_url.to_string(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check the settings before any connection is attempted
    pub fn validate(&self) -> Result<()> {
        let base_url = Url::parse(&self.base_url)?;
        match base_url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(StreamError::Config(format!(
                    "base_url scheme must be ws or wss, got {other}"
                )));
            }
        }
        if base_url.cannot_be_a_base() {
            return Err(StreamError::Config(
                "base_url cannot carry a path".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StreamError::Config(
                "connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.raw_buffer == 0 {
            return Err(StreamError::Config(
                "raw_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Append a stream suffix to the base address
    ///
    /// `wss://host/ws` + `btcusdt@depth` gives `wss://host/ws/btcusdt@depth`.
    pub fn endpoint(&self, suffix: &str) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{suffix}"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = StreamConfig::default();
        let url = config.endpoint("btcusdt@depth").expect("endpoint");
        assert_eq!(url.as_str(), "wss://stream.binance.com:9443/ws/btcusdt@depth");
    }

    #[test]
    fn test_endpoint_with_trailing_slash() {
        let config = StreamConfig::with_base_url("ws://127.0.0.1:9000/ws/").expect("config");
        let url = config.endpoint("listenkey123").expect("endpoint");
        assert_eq!(url.as_str(), "ws://127.0.0.1:9000/ws/listenkey123");
    }

    #[test]
    fn test_rejects_http_scheme() {
        let err = StreamConfig::with_base_url("https://api.binance.com").unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_buffer() {
        let config = StreamConfig {
            raw_buffer: 0,
            ..StreamConfig::default()
        };
        assert!(matches!(config.validate(), Err(StreamError::Config(_))));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"connect_timeout_ms": 2500}"#).expect("config");
        assert_eq!(config.connect_timeout_ms, 2500);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.raw_buffer, 1024);
    }
}
