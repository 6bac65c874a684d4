/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed and validated tail configuration
[POS]:    Configuration layer - runner setup
[UPDATE]: When adding new configuration options
*/

use std::collections::HashSet;

use anyhow::{Context, Result, bail};
use binance_stream_adapter::{StreamConfig, StreamKind};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the stream tail runner
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TailConfig {
    /// Connection settings; omitted fields keep the public endpoint defaults
    #[serde(default)]
    pub stream: StreamConfig,
    /// How each delivered event is written
    #[serde(default)]
    pub output: OutputFormat,
    /// Stop after this many events across all subscriptions
    #[serde(default)]
    pub max_events: Option<u64>,
    /// Streams to open, one connection each
    pub subscriptions: Vec<SubscriptionConfig>,
}

/// One logical stream to tail
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionConfig {
    /// Label written next to every event; defaults to the endpoint suffix
    #[serde(default)]
    pub id: Option<String>,
    pub stream: StreamKind,
}

impl SubscriptionConfig {
    pub fn label(&self) -> Result<String> {
        match &self.id {
            Some(id) => Ok(id.clone()),
            None => Ok(self.stream.endpoint_suffix()?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Label, kind, symbol and event time
    Summary,
}

impl TailConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("read config file {path}"))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse yaml config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.stream.validate().context("stream settings")?;
        if self.subscriptions.is_empty() {
            bail!("at least one subscription is required");
        }
        if self.max_events == Some(0) {
            bail!("max_events must be positive when set");
        }

        let mut labels = HashSet::new();
        for subscription in &self.subscriptions {
            let label = subscription
                .label()
                .with_context(|| format!("subscription {:?}", subscription.stream.name()))?;
            if !labels.insert(label.clone()) {
                bail!("duplicate subscription id `{label}`");
            }
        }
        Ok(())
    }
}
