/*
[INPUT]:  Raw user-data (listen key) payload bytes
[OUTPUT]: UserDataEvent variant chosen by the `e` discriminator
[POS]:    WebSocket layer - discriminator routing for the multiplexed user stream
[UPDATE]: When the exchange adds user-data event types
*/

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DecodeError, DispatchError, UnroutableDiscriminator};
use crate::types::{UserAccountEvent, UserDataEvent, UserTradeEvent};
use crate::ws::decode::{EventDecoder, decode_structural, ensure_object};

/// Known values of the `e` field on the user-data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserDataKind {
    ExecutionReport,
    OutboundAccountInfo,
}

impl UserDataKind {
    /// The only place a discriminator value is mapped to an event shape
    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value {
            "executionReport" => Some(UserDataKind::ExecutionReport),
            "outboundAccountInfo" => Some(UserDataKind::OutboundAccountInfo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserDataKind::ExecutionReport => "executionReport",
            UserDataKind::OutboundAccountInfo => "outboundAccountInfo",
        }
    }
}

// Reads `e` and skips everything else without building the full record.
#[derive(Deserialize)]
struct EventTypeProbe {
    #[serde(rename = "e", default)]
    event_type: Option<Value>,
}

/// Extract the raw `e` value.
///
/// Malformed payloads are a [`DecodeError`]; an absent, null, empty or
/// non-string `e` is [`UnroutableDiscriminator`].
pub fn probe_event_type(payload: &[u8]) -> Result<String, DispatchError> {
    ensure_object(payload)?;
    let probe: EventTypeProbe = serde_json::from_slice(payload).map_err(DecodeError::from)?;
    match probe.event_type {
        None | Some(Value::Null) => Err(UnroutableDiscriminator::Missing.into()),
        Some(Value::String(event_type)) if event_type.is_empty() => {
            Err(UnroutableDiscriminator::Empty.into())
        }
        Some(Value::String(event_type)) => Ok(event_type),
        Some(other) => Err(UnroutableDiscriminator::NotAString(other.to_string()).into()),
    }
}

/// Classify a user-data payload without decoding it.
pub fn route_user_data(payload: &[u8]) -> Result<UserDataKind, DispatchError> {
    let event_type = probe_event_type(payload)?;
    UserDataKind::from_discriminator(&event_type)
        .ok_or_else(|| UnroutableDiscriminator::Unknown(event_type).into())
}

/// Route on `e`, then decode only the shape it names.
pub fn decode_user_data(payload: &[u8]) -> Result<UserDataEvent, DispatchError> {
    let kind = route_user_data(payload)?;
    Ok(decode_kind(kind, payload)?)
}

fn decode_kind(kind: UserDataKind, payload: &[u8]) -> Result<UserDataEvent, DecodeError> {
    match kind {
        UserDataKind::ExecutionReport => {
            decode_structural::<UserTradeEvent>(payload).map(UserDataEvent::Trade)
        }
        UserDataKind::OutboundAccountInfo => {
            decode_structural::<UserAccountEvent>(payload).map(UserDataEvent::Account)
        }
    }
}

/// Both user-data shapes as [`UserDataEvent`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataDecoder;

impl EventDecoder for UserDataDecoder {
    type Event = UserDataEvent;

    fn decode(&self, payload: &[u8]) -> Result<UserDataEvent, DispatchError> {
        decode_user_data(payload)
    }
}

/// Execution reports only; account snapshots are filtered.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserTradeDecoder;

impl EventDecoder for UserTradeDecoder {
    type Event = UserTradeEvent;

    fn decode(&self, payload: &[u8]) -> Result<UserTradeEvent, DispatchError> {
        match route_user_data(payload)? {
            UserDataKind::ExecutionReport => Ok(decode_structural(payload)?),
            other => Err(DispatchError::Filtered {
                event_type: other.as_str(),
            }),
        }
    }
}

/// Account snapshots only; execution reports are filtered.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAccountDecoder;

impl EventDecoder for UserAccountDecoder {
    type Event = UserAccountEvent;

    fn decode(&self, payload: &[u8]) -> Result<UserAccountEvent, DispatchError> {
        match route_user_data(payload)? {
            UserDataKind::OutboundAccountInfo => Ok(decode_structural(payload)?),
            other => Err(DispatchError::Filtered {
                event_type: other.as_str(),
            }),
        }
    }
}
