/*
[INPUT]:  Exchange stream schema (single-letter, case-sensitive field tags)
[OUTPUT]: Immutable typed event records and the StreamEvent sum type
[POS]:    Data layer - decoded event shapes for every logical stream
[UPDATE]: When the stream schema changes or new event shapes are added
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{ExecutionType, OrderStatus, OrderType, Side, TimeInForce};

/// One `[price, quantity]` entry of a depth update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// `<symbol>@depth` update.
///
/// Built by the positional decoder only; `bids` and `asks` keep the
/// exchange's index order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DepthEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: i64,
    #[serde(rename = "u")]
    pub final_update_id: i64,
    #[serde(rename = "b")]
    pub bids: Vec<PriceLevel>,
    #[serde(rename = "a")]
    pub asks: Vec<PriceLevel>,
}

/// `<symbol>@kline_<interval>` update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: Kline,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Kline {
    #[serde(rename = "t")]
    pub start_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "f")]
    pub first_trade_id: i64,
    #[serde(rename = "L")]
    pub last_trade_id: i64,
    #[serde(rename = "o", with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(rename = "c", with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(rename = "h", with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(rename = "v", with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    #[serde(rename = "n")]
    pub trade_count: i64,
    #[serde(rename = "x")]
    pub is_final: bool,
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub quote_volume: Decimal,
    #[serde(rename = "V", with = "rust_decimal::serde::str")]
    pub taker_buy_volume: Decimal,
    #[serde(rename = "Q", with = "rust_decimal::serde::str")]
    pub taker_buy_quote_volume: Decimal,
}

/// `<symbol>@aggTrade` update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggTradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "a")]
    pub agg_trade_id: i64,
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(rename = "f")]
    pub first_trade_id: i64,
    #[serde(rename = "l")]
    pub last_trade_id: i64,
    #[serde(rename = "T")]
    pub trade_time: i64,
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// `executionReport` on the user-data stream.
///
/// Several tags differ only by case (`l`/`L`, `c`/`C`, `x`/`X`, `t`/`T`,
/// `f`/`F`, `p`/`P`, `n`/`N`); each maps to its own field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserTradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s", deserialize_with = "serde_helpers::null_as_default")]
    pub symbol: String,
    #[serde(rename = "c", deserialize_with = "serde_helpers::null_as_default")]
    pub client_order_id: String,
    #[serde(rename = "S", deserialize_with = "serde_helpers::null_as_default")]
    pub side: Side,
    #[serde(rename = "o", deserialize_with = "serde_helpers::null_as_default")]
    pub order_type: OrderType,
    #[serde(rename = "f", deserialize_with = "serde_helpers::null_as_default")]
    pub time_in_force: TimeInForce,
    #[serde(
        rename = "q",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub order_quantity: Decimal,
    #[serde(
        rename = "p",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub order_price: Decimal,
    #[serde(
        rename = "P",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub stop_price: Decimal,
    #[serde(
        rename = "F",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub iceberg_quantity: Decimal,
    #[serde(rename = "C", deserialize_with = "serde_helpers::null_as_default")]
    pub original_client_order_id: String,
    #[serde(rename = "x", deserialize_with = "serde_helpers::null_as_default")]
    pub execution_type: ExecutionType,
    #[serde(rename = "X", deserialize_with = "serde_helpers::null_as_default")]
    pub order_status: OrderStatus,
    #[serde(rename = "r", deserialize_with = "serde_helpers::null_as_default")]
    pub reject_reason: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(
        rename = "l",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub last_executed_quantity: Decimal,
    #[serde(
        rename = "z",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub cumulative_filled_quantity: Decimal,
    #[serde(
        rename = "L",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub last_executed_price: Decimal,
    #[serde(
        rename = "n",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub commission_amount: Decimal,
    #[serde(rename = "N", deserialize_with = "serde_helpers::null_as_default")]
    pub commission_asset: String,
    #[serde(rename = "T")]
    pub transaction_time: i64,
    #[serde(rename = "t")]
    pub trade_id: i64,
    #[serde(rename = "w")]
    pub is_order_working: bool,
    #[serde(rename = "m")]
    pub is_maker: bool,
}

/// `outboundAccountInfo` on the user-data stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAccountEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(
        rename = "m",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub maker_commission_rate: Decimal,
    #[serde(
        rename = "t",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub taker_commission_rate: Decimal,
    #[serde(
        rename = "b",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub buyer_commission_rate: Decimal,
    #[serde(
        rename = "s",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub seller_commission_rate: Decimal,
    #[serde(rename = "T")]
    pub can_trade: bool,
    #[serde(rename = "W")]
    pub can_withdraw: bool,
    #[serde(rename = "D")]
    pub can_deposit: bool,
    #[serde(rename = "u")]
    pub last_update_id: i64,
    #[serde(rename = "B", deserialize_with = "serde_helpers::null_as_default")]
    pub balances: Vec<BalanceUpdate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceUpdate {
    #[serde(rename = "a", deserialize_with = "serde_helpers::null_as_default")]
    pub asset: String,
    #[serde(
        rename = "f",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub free: Decimal,
    #[serde(
        rename = "l",
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub locked: Decimal,
}

/// Events multiplexed over one listen-key connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserDataEvent {
    Trade(UserTradeEvent),
    Account(UserAccountEvent),
}

impl UserDataEvent {
    pub fn event_time(&self) -> i64 {
        match self {
            UserDataEvent::Trade(event) => event.event_time,
            UserDataEvent::Account(event) => event.event_time,
        }
    }
}

/// Every event shape a subscription can deliver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Depth(DepthEvent),
    Kline(KlineEvent),
    AggTrade(AggTradeEvent),
    UserTrade(UserTradeEvent),
    UserAccount(UserAccountEvent),
}

impl StreamEvent {
    /// Short name of the variant, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Depth(_) => "depth",
            StreamEvent::Kline(_) => "kline",
            StreamEvent::AggTrade(_) => "agg_trade",
            StreamEvent::UserTrade(_) => "user_trade",
            StreamEvent::UserAccount(_) => "user_account",
        }
    }

    /// Exchange event time in milliseconds since the epoch
    pub fn event_time(&self) -> i64 {
        match self {
            StreamEvent::Depth(event) => event.event_time,
            StreamEvent::Kline(event) => event.event_time,
            StreamEvent::AggTrade(event) => event.event_time,
            StreamEvent::UserTrade(event) => event.event_time,
            StreamEvent::UserAccount(event) => event.event_time,
        }
    }

    pub fn event_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.event_time())
    }

    /// Symbol the event refers to; account snapshots have none
    pub fn symbol(&self) -> Option<&str> {
        match self {
            StreamEvent::Depth(event) => Some(&event.symbol),
            StreamEvent::Kline(event) => Some(&event.symbol),
            StreamEvent::AggTrade(event) => Some(&event.symbol),
            StreamEvent::UserTrade(event) => Some(&event.symbol),
            StreamEvent::UserAccount(_) => None,
        }
    }
}

impl From<UserDataEvent> for StreamEvent {
    fn from(event: UserDataEvent) -> Self {
        match event {
            UserDataEvent::Trade(event) => StreamEvent::UserTrade(event),
            UserDataEvent::Account(event) => StreamEvent::UserAccount(event),
        }
    }
}

mod serde_helpers {
    use super::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn deserialize_decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Decimal::ZERO);
        }

        if let Some(raw) = value.as_str() {
            if raw.trim().is_empty() {
                return Ok(Decimal::ZERO);
            }
            return Decimal::from_str(raw).map_err(serde::de::Error::custom);
        }

        if let Some(int) = value.as_i64() {
            return Ok(Decimal::from(int));
        }
        if let Some(int) = value.as_u64() {
            return Ok(Decimal::from(int));
        }
        if value.is_number() {
            // floats render in exponent form outside roughly 1e-5..1e16
            let rendered = value.to_string();
            return Decimal::from_str(&rendered)
                .or_else(|_| Decimal::from_scientific(&rendered))
                .map_err(serde::de::Error::custom);
        }

        Err(serde::de::Error::custom("invalid decimal value"))
    }

    pub fn serialize_decimal<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn kline_deserializes_nested_candle() {
        let value = json!({
            "e": "kline",
            "E": 1_672_515_782_136_i64,
            "s": "BNBBTC",
            "k": {
                "t": 1_672_515_780_000_i64,
                "T": 1_672_515_839_999_i64,
                "s": "BNBBTC",
                "i": "1m",
                "f": 100,
                "L": 200,
                "o": "0.0010",
                "c": "0.0020",
                "h": "0.0025",
                "l": "0.0015",
                "v": "1000",
                "n": 100,
                "x": false,
                "q": "1.0000",
                "V": "500",
                "Q": "0.500",
                "B": "123456"
            }
        });

        let event: KlineEvent = serde_json::from_value(value).expect("kline should deserialize");

        assert_eq!(event.kline.interval, "1m");
        assert_eq!(event.kline.first_trade_id, 100);
        assert_eq!(event.kline.last_trade_id, 200);
        assert_eq!(event.kline.open.to_string(), "0.0010");
        assert_eq!(event.kline.low.to_string(), "0.0015");
        assert_eq!(event.kline.quote_volume.to_string(), "1.0000");
        assert_eq!(event.kline.taker_buy_quote_volume.to_string(), "0.500");
        assert!(!event.kline.is_final);
    }

    #[test]
    fn agg_trade_uppercase_m_does_not_populate_buyer_maker() {
        let value = json!({
            "e": "aggTrade",
            "E": 123_456_789,
            "s": "BNBBTC",
            "a": 12345,
            "p": "0.001",
            "q": "100",
            "f": 100,
            "l": 105,
            "T": 123_456_785,
            "m": false,
            "M": true
        });

        let event: AggTradeEvent = serde_json::from_value(value).expect("agg trade should deserialize");

        assert!(!event.is_buyer_maker);
        assert_eq!(event.first_trade_id, 100);
        assert_eq!(event.last_trade_id, 105);
        assert_eq!(event.trade_time, 123_456_785);
        assert_eq!(event.event_time, 123_456_789);
    }

    #[test]
    fn numeric_decimal_fields_keep_exponent_and_integer_values() {
        let value = json!({
            "e": "executionReport",
            "n": 1e-7,
            "q": 12_345_678_901_234_567_u64,
            "p": -3,
            "L": 2.5e21
        });

        let event: UserTradeEvent = serde_json::from_value(value).expect("numeric decimals");

        assert_eq!(event.commission_amount, Decimal::from_str("0.0000001").expect("decimal"));
        assert_eq!(event.order_quantity, Decimal::from(12_345_678_901_234_567_u64));
        assert_eq!(event.order_price, Decimal::from(-3));
        assert_eq!(
            event.last_executed_price,
            Decimal::from_str("2500000000000000000000").expect("decimal")
        );
    }

    #[test]
    fn agg_trade_rejects_numeric_price() {
        let value = json!({ "e": "aggTrade", "p": 0.001 });
        assert!(serde_json::from_value::<AggTradeEvent>(value).is_err());
    }

    #[test]
    fn user_trade_tolerates_null_commission_asset() {
        let value = json!({
            "e": "executionReport",
            "n": "0",
            "N": null
        });

        let event: UserTradeEvent = serde_json::from_value(value).expect("user trade should deserialize");

        assert_eq!(event.commission_asset, "");
        assert_eq!(event.commission_amount, Decimal::ZERO);
        assert_eq!(event.side, Side::Unknown);
    }

    #[test]
    fn account_accepts_numeric_commission_rates() {
        let value = json!({
            "e": "outboundAccountInfo",
            "m": 10,
            "t": "10",
            "b": 0,
            "s": 0,
            "B": [
                { "a": "LTC", "f": "17366.18538083", "l": "0.00000000" },
                { "a": "BTC", "f": "10537.85314051", "l": "2.19464093" }
            ]
        });

        let event: UserAccountEvent = serde_json::from_value(value).expect("account should deserialize");

        assert_eq!(event.maker_commission_rate, Decimal::from(10));
        assert_eq!(event.taker_commission_rate, Decimal::from(10));
        assert_eq!(event.balances[0].asset, "LTC");
        assert_eq!(event.balances[1].locked.to_string(), "2.19464093");
    }

    #[test]
    fn stream_event_accessors() {
        let event = StreamEvent::AggTrade(AggTradeEvent {
            event_time: 1_524_984_672_572,
            symbol: "BTCUSDT".to_string(),
            ..AggTradeEvent::default()
        });

        assert_eq!(event.kind(), "agg_trade");
        assert_eq!(event.symbol(), Some("BTCUSDT"));
        let datetime = event.event_datetime().expect("valid timestamp");
        assert_eq!(datetime.timestamp_millis(), 1_524_984_672_572);

        let account: StreamEvent = UserDataEvent::Account(UserAccountEvent::default()).into();
        assert_eq!(account.symbol(), None);
        assert_eq!(account.kind(), "user_account");
    }
}
