/*
[INPUT]:  StreamConfig, a Connector and per-subscription handlers
[OUTPUT]: SubscriptionHandle per logical stream, one dispatch task each
[POS]:    WebSocket layer - caller-facing registration API
[UPDATE]: When adding logical streams or changing subscription startup
*/

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::types::{
    AggTradeEvent, DepthEvent, KlineEvent, KlineInterval, StreamEvent, UserAccountEvent,
    UserDataEvent, UserTradeEvent,
};
use crate::ws::connection::{Connector, TungsteniteConnector};
use crate::ws::decode::{AggTradeDecoder, EventDecoder, KlineDecoder, RawPassthrough};
use crate::ws::depth::DepthDecoder;
use crate::ws::dispatch::{DispatchStats, Dispatcher, SubscriptionState};
use crate::ws::stream::{StreamKind, listen_key_suffix};
use crate::ws::subscription::SubscriptionHandle;
use crate::ws::user_data::{UserAccountDecoder, UserDataDecoder, UserTradeDecoder};

/// Registers logical streams against one base address.
///
/// Every subscription gets its own connection and its own task; handlers
/// run on that task one message at a time.
#[derive(Debug, Clone)]
pub struct StreamClient<C = TungsteniteConnector> {
    config: StreamConfig,
    connector: Arc<C>,
}

impl StreamClient<TungsteniteConnector> {
    /// Client for the public endpoint with default settings
    pub fn new() -> Self {
        let config = StreamConfig::default();
        let connector = TungsteniteConnector::from_config(&config);
        Self {
            config,
            connector: Arc::new(connector),
        }
    }

    pub fn with_config(config: StreamConfig) -> Result<Self> {
        let connector = TungsteniteConnector::from_config(&config);
        Self::with_connector(config, connector)
    }
}

impl Default for StreamClient<TungsteniteConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> StreamClient<C> {
    pub fn with_connector(config: StreamConfig, connector: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Arc::new(connector),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Order book diffs, levels in exchange order
    pub async fn subscribe_depth<H>(&self, symbol: &str, handler: H) -> Result<SubscriptionHandle>
    where
        H: FnMut(DepthEvent) + Send + 'static,
    {
        let kind = StreamKind::Depth {
            symbol: symbol.to_string(),
        };
        self.subscribe_with(&kind, DepthDecoder, handler).await
    }

    pub async fn subscribe_kline<H>(
        &self,
        symbol: &str,
        interval: KlineInterval,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        H: FnMut(KlineEvent) + Send + 'static,
    {
        let kind = StreamKind::Kline {
            symbol: symbol.to_string(),
            interval,
        };
        self.subscribe_with(&kind, KlineDecoder::new(), handler).await
    }

    pub async fn subscribe_agg_trade<H>(
        &self,
        symbol: &str,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        H: FnMut(AggTradeEvent) + Send + 'static,
    {
        let kind = StreamKind::AggTrade {
            symbol: symbol.to_string(),
        };
        self.subscribe_with(&kind, AggTradeDecoder::new(), handler)
            .await
    }

    /// Execution reports on a listen key; account snapshots are filtered out
    pub async fn subscribe_user_trades<H>(
        &self,
        listen_key: &str,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        H: FnMut(UserTradeEvent) + Send + 'static,
    {
        let kind = StreamKind::UserTrades {
            listen_key: listen_key.to_string(),
        };
        self.subscribe_with(&kind, UserTradeDecoder, handler).await
    }

    /// Account snapshots on a listen key; execution reports are filtered out
    pub async fn subscribe_user_account<H>(
        &self,
        listen_key: &str,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        H: FnMut(UserAccountEvent) + Send + 'static,
    {
        let kind = StreamKind::UserAccount {
            listen_key: listen_key.to_string(),
        };
        self.subscribe_with(&kind, UserAccountDecoder, handler)
            .await
    }

    /// Every routable user-data event on a listen key
    pub async fn subscribe_user_data<H>(
        &self,
        listen_key: &str,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        H: FnMut(UserDataEvent) + Send + 'static,
    {
        let kind = StreamKind::UserData {
            listen_key: listen_key.to_string(),
        };
        self.subscribe_with(&kind, UserDataDecoder, handler).await
    }

    /// Undecoded user-data payloads, one per frame
    pub async fn subscribe_user_data_raw<H>(
        &self,
        listen_key: &str,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        H: FnMut(Vec<u8>) + Send + 'static,
    {
        let suffix = listen_key_suffix(listen_key)?;
        self.start("user_data_raw", &suffix, RawPassthrough, handler)
            .await
    }

    /// Any logical stream, events delivered as [`StreamEvent`]
    pub async fn subscribe<H>(&self, kind: StreamKind, handler: H) -> Result<SubscriptionHandle>
    where
        H: FnMut(StreamEvent) + Send + 'static,
    {
        let suffix = kind.endpoint_suffix()?;
        let name = kind.name();
        self.start(name, &suffix, kind, handler).await
    }

    async fn subscribe_with<D, H>(
        &self,
        kind: &StreamKind,
        decoder: D,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        D: EventDecoder,
        H: FnMut(D::Event) + Send + 'static,
    {
        let suffix = kind.endpoint_suffix()?;
        self.start(kind.name(), &suffix, decoder, handler).await
    }

    async fn start<D, H>(
        &self,
        stream: &'static str,
        suffix: &str,
        decoder: D,
        handler: H,
    ) -> Result<SubscriptionHandle>
    where
        D: EventDecoder,
        H: FnMut(D::Event) + Send + 'static,
    {
        let endpoint = self.config.endpoint(suffix)?;
        let source = self.connector.open(&endpoint).await?;

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let stats = Arc::new(DispatchStats::default());
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Active);

        let dispatcher = Dispatcher {
            id,
            endpoint: endpoint.to_string(),
            decoder,
            handler,
            stats: stats.clone(),
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(dispatcher.run(source));

        info!(subscription_id = %id, stream, endpoint = %endpoint, "ws subscription started");

        Ok(SubscriptionHandle::new(
            id, endpoint, cancel, state_rx, stats, task,
        ))
    }
}
