/*
[INPUT]:  Logical stream kind plus its parameters (symbol, interval, listen key)
[OUTPUT]: Endpoint suffix and the decoding strategy implied by the kind
[POS]:    WebSocket layer - registry of logical streams
[UPDATE]: When adding a logical stream or changing endpoint naming
*/

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result, StreamError};
use crate::types::{KlineInterval, StreamEvent};
use crate::ws::decode::{AggTradeDecoder, EventDecoder, KlineDecoder};
use crate::ws::depth::DepthDecoder;
use crate::ws::user_data::{UserAccountDecoder, UserDataDecoder, UserTradeDecoder};

/// A caller-visible stream together with the parameters that name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamKind {
    Depth { symbol: String },
    Kline { symbol: String, interval: KlineInterval },
    AggTrade { symbol: String },
    UserTrades { listen_key: String },
    UserAccount { listen_key: String },
    UserData { listen_key: String },
}

impl StreamKind {
    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Depth { .. } => "depth",
            StreamKind::Kline { .. } => "kline",
            StreamKind::AggTrade { .. } => "agg_trade",
            StreamKind::UserTrades { .. } => "user_trades",
            StreamKind::UserAccount { .. } => "user_account",
            StreamKind::UserData { .. } => "user_data",
        }
    }

    /// Path appended to the configured base address
    pub fn endpoint_suffix(&self) -> Result<String> {
        match self {
            StreamKind::Depth { symbol } => Ok(format!("{}@depth", stream_symbol(symbol)?)),
            StreamKind::Kline { symbol, interval } => {
                Ok(format!("{}@kline_{}", stream_symbol(symbol)?, interval))
            }
            StreamKind::AggTrade { symbol } => Ok(format!("{}@aggTrade", stream_symbol(symbol)?)),
            StreamKind::UserTrades { listen_key }
            | StreamKind::UserAccount { listen_key }
            | StreamKind::UserData { listen_key } => listen_key_suffix(listen_key),
        }
    }
}

impl EventDecoder for StreamKind {
    type Event = StreamEvent;

    fn decode(&self, payload: &[u8]) -> std::result::Result<StreamEvent, DispatchError> {
        match self {
            StreamKind::Depth { .. } => DepthDecoder.decode(payload).map(StreamEvent::Depth),
            StreamKind::Kline { .. } => KlineDecoder::new().decode(payload).map(StreamEvent::Kline),
            StreamKind::AggTrade { .. } => {
                AggTradeDecoder::new().decode(payload).map(StreamEvent::AggTrade)
            }
            StreamKind::UserTrades { .. } => {
                UserTradeDecoder.decode(payload).map(StreamEvent::UserTrade)
            }
            StreamKind::UserAccount { .. } => {
                UserAccountDecoder.decode(payload).map(StreamEvent::UserAccount)
            }
            StreamKind::UserData { .. } => UserDataDecoder.decode(payload).map(StreamEvent::from),
        }
    }
}

/// Lowercased symbol for a market stream name.
pub fn stream_symbol(symbol: &str) -> Result<String> {
    if symbol.is_empty() {
        return Err(StreamError::InvalidParameter("symbol is empty".to_string()));
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StreamError::InvalidParameter(format!(
            "symbol `{symbol}` must be ASCII alphanumeric"
        )));
    }
    Ok(symbol.to_ascii_lowercase())
}

/// Listen keys are used verbatim; their case is significant.
pub fn listen_key_suffix(listen_key: &str) -> Result<String> {
    if listen_key.is_empty() {
        return Err(StreamError::InvalidParameter("listen key is empty".to_string()));
    }
    if !listen_key.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(StreamError::InvalidParameter(
            "listen key must be ASCII alphanumeric".to_string(),
        ));
    }
    Ok(listen_key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StreamKind::Depth { symbol: "BTCUSDT".into() }, "btcusdt@depth")]
    #[case(StreamKind::AggTrade { symbol: "BnbBtc".into() }, "bnbbtc@aggTrade")]
    #[case(
        StreamKind::Kline { symbol: "ETHBTC".into(), interval: KlineInterval::FifteenMinutes },
        "ethbtc@kline_15m"
    )]
    #[case(
        StreamKind::Kline { symbol: "ETHBTC".into(), interval: KlineInterval::OneMonth },
        "ethbtc@kline_1M"
    )]
    #[case(StreamKind::UserTrades { listen_key: "pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1".into() }, "pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1")]
    #[case(StreamKind::UserData { listen_key: "AbC123".into() }, "AbC123")]
    fn test_endpoint_suffix(#[case] kind: StreamKind, #[case] expected: &str) {
        assert_eq!(kind.endpoint_suffix().expect("suffix"), expected);
    }

    #[rstest]
    #[case(StreamKind::Depth { symbol: String::new() })]
    #[case(StreamKind::AggTrade { symbol: "BTC/USDT".into() })]
    #[case(StreamKind::UserAccount { listen_key: String::new() })]
    #[case(StreamKind::UserData { listen_key: "abc/../def".into() })]
    fn test_endpoint_suffix_rejects_bad_parameters(#[case] kind: StreamKind) {
        assert!(matches!(
            kind.endpoint_suffix(),
            Err(StreamError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kind_deserializes_from_tagged_config() {
        let kind: StreamKind =
            serde_json::from_str(r#"{"kind":"kline","symbol":"BTCUSDT","interval":"1h"}"#)
                .expect("kind");
        assert_eq!(
            kind,
            StreamKind::Kline {
                symbol: "BTCUSDT".into(),
                interval: KlineInterval::OneHour
            }
        );
        assert_eq!(kind.name(), "kline");
    }

    #[test]
    fn test_kind_decodes_into_matching_variant() {
        let depth = StreamKind::Depth { symbol: "BNBBTC".into() };
        let event = depth
            .decode(br#"{"e":"depthUpdate","s":"BNBBTC","b":[["1.0","2.0"]],"a":[]}"#)
            .expect("depth");
        assert!(matches!(event, StreamEvent::Depth(ref d) if d.bids.len() == 1));

        let user = StreamKind::UserData { listen_key: "abc".into() };
        let event = user
            .decode(br#"{"e":"outboundAccountInfo","B":[]}"#)
            .expect("account");
        assert!(matches!(event, StreamEvent::UserAccount(_)));

        let trades = StreamKind::UserTrades { listen_key: "abc".into() };
        assert!(trades
            .decode(br#"{"e":"outboundAccountInfo","B":[]}"#)
            .unwrap_err()
            .is_filtered());
    }
}
