/*
[INPUT]:  Raw message payload bytes
[OUTPUT]: One typed event, or a DispatchError explaining the drop
[POS]:    WebSocket layer - decoding strategies bound to subscriptions
[UPDATE]: When adding a decoding strategy or changing strictness rules
*/

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::{DecodeError, DispatchError};
use crate::types::{AggTradeEvent, KlineEvent};

/// Turns one raw payload into at most one event.
///
/// Implementations are pure and synchronous; the dispatch loop calls them
/// one message at a time.
pub trait EventDecoder: Send + Sync + 'static {
    type Event: Send + 'static;

    fn decode(&self, payload: &[u8]) -> Result<Self::Event, DispatchError>;
}

/// Map a JSON object directly onto `T` by exact, case-sensitive tag names.
///
/// Declared fields missing from the payload keep their default, undeclared
/// fields are ignored, and a present field of the wrong type fails the
/// whole message. Array roots are rejected so a struct is never filled
/// positionally.
pub fn decode_structural<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    ensure_object(payload)?;
    Ok(serde_json::from_slice(payload)?)
}

pub(crate) fn ensure_object(payload: &[u8]) -> Result<(), DecodeError> {
    match payload.iter().find(|byte| !byte.is_ascii_whitespace()) {
        Some(b'{') => Ok(()),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Structural decoder for streams that carry exactly one shape.
pub struct StructuralDecoder<T> {
    _shape: PhantomData<fn() -> T>,
}

impl<T> StructuralDecoder<T> {
    pub fn new() -> Self {
        Self {
            _shape: PhantomData,
        }
    }
}

impl<T> Default for StructuralDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for StructuralDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for StructuralDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralDecoder")
            .field("shape", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> EventDecoder for StructuralDecoder<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Event = T;

    fn decode(&self, payload: &[u8]) -> Result<T, DispatchError> {
        Ok(decode_structural(payload)?)
    }
}

pub type KlineDecoder = StructuralDecoder<KlineEvent>;
pub type AggTradeDecoder = StructuralDecoder<AggTradeEvent>;

/// Hands the payload through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPassthrough;

impl EventDecoder for RawPassthrough {
    type Event = Vec<u8>;

    fn decode(&self, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
        Ok(payload.to_vec())
    }
}
