/*
[INPUT]:  Raw `<symbol>@depth` payload bytes
[OUTPUT]: DepthEvent with bids/asks in exchange index order
[POS]:    WebSocket layer - positional decoding of tuple-shaped depth levels
[UPDATE]: When the depth payload layout changes
*/

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{BookSide, DecodeError, DispatchError};
use crate::types::{DepthEvent, PriceLevel};
use crate::ws::decode::{EventDecoder, ensure_object};

// Fixed by the exchange schema: each level is `[price, quantity]`.
const PRICE_INDEX: usize = 0;
const QUANTITY_INDEX: usize = 1;
const LEVEL_ARITY: usize = 2;

/// Decode a depth update by walking the `b` and `a` arrays positionally.
///
/// Level order is the exchange's update priority and is kept as-is. One bad
/// level fails the whole message. Header fields that are absent read as
/// zero; present with the wrong type they fail the message.
pub fn decode_depth(payload: &[u8]) -> Result<DepthEvent, DecodeError> {
    ensure_object(payload)?;
    let message: Value = serde_json::from_slice(payload)?;

    let bids = levels(&message, "b", BookSide::Bid)?;
    let asks = levels(&message, "a", BookSide::Ask)?;

    Ok(DepthEvent {
        event_type: string_field(&message, "e")?,
        event_time: integer_field(&message, "E")?,
        symbol: string_field(&message, "s")?,
        first_update_id: integer_field(&message, "U")?,
        final_update_id: integer_field(&message, "u")?,
        bids,
        asks,
    })
}

fn levels(message: &Value, field: &'static str, side: BookSide) -> Result<Vec<PriceLevel>, DecodeError> {
    let entries = match message.get(field) {
        Some(Value::Array(entries)) => entries,
        None | Some(Value::Null) => return Err(DecodeError::MissingField(field)),
        Some(_) => {
            return Err(DecodeError::InvalidField {
                field,
                expected: "array",
            });
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            level(entry).map_err(|reason| DecodeError::InvalidLevel {
                side,
                index,
                reason,
            })
        })
        .collect()
}

fn level(entry: &Value) -> Result<PriceLevel, String> {
    let pair = entry
        .as_array()
        .ok_or_else(|| "expected a [price, quantity] array".to_string())?;
    if pair.len() != LEVEL_ARITY {
        return Err(format!("expected {LEVEL_ARITY} entries, got {}", pair.len()));
    }

    let price = decimal_entry(&pair[PRICE_INDEX], "price")?;
    let quantity = decimal_entry(&pair[QUANTITY_INDEX], "quantity")?;
    Ok(PriceLevel::new(price, quantity))
}

fn decimal_entry(value: &Value, name: &str) -> Result<Decimal, String> {
    let raw = value
        .as_str()
        .ok_or_else(|| format!("{name} is not a string"))?;
    Decimal::from_str(raw).map_err(|err| format!("{name} `{raw}` is not a decimal: {err}"))
}

fn string_field(message: &Value, field: &'static str) -> Result<String, DecodeError> {
    match message.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            expected: "string",
        }),
    }
}

fn integer_field(message: &Value, field: &'static str) -> Result<i64, DecodeError> {
    match message.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value.as_i64().ok_or(DecodeError::InvalidField {
            field,
            expected: "integer",
        }),
    }
}

/// Decoder bound to depth subscriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthDecoder;

impl EventDecoder for DepthDecoder {
    type Event = DepthEvent;

    fn decode(&self, payload: &[u8]) -> Result<DepthEvent, DispatchError> {
        Ok(decode_depth(payload)?)
    }
}
