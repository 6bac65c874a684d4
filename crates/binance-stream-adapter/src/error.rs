/*
[INPUT]:  Error sources (connector, websocket, configuration, per-message decoding)
[OUTPUT]: Structured error types separating terminal faults from per-message drops
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or new drop classifications
*/

use std::fmt;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Main error type for the stream adapter.
///
/// Everything here ends a subscription or prevents one from starting.
/// Per-message problems are [`DispatchError`] and never surface here.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The connector reported a transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// WebSocket protocol or socket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Dial did not complete in time
    #[error("Connection timeout after {duration_ms}ms")]
    ConnectTimeout { duration_ms: u64 },

    /// Endpoint URL could not be built
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Symbol, listen key or interval rejected before dialing
    #[error("Invalid stream parameter: {0}")]
    InvalidParameter(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The dispatch task panicked or was aborted
    #[error("Dispatch task failed: {0}")]
    Dispatch(String),
}

impl StreamError {
    /// Check if the error came from the connection rather than the caller
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StreamError::Transport(_)
                | StreamError::WebSocket(_)
                | StreamError::ConnectTimeout { .. }
        )
    }

    /// Create a transport error from any displayable cause
    pub fn transport(cause: impl fmt::Display) -> Self {
        StreamError::Transport(cause.to_string())
    }
}

/// Result type alias for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Side of the book a depth level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

impl BookSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookSide::Bid => "bid",
            BookSide::Ask => "ask",
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single raw message could not be mapped onto its target shape.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Malformed bytes or a type mismatch on a declared field
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// Root of the message is not a JSON object
    #[error("message is not a JSON object")]
    NotAnObject,

    /// A structural marker the shape cannot do without
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A header field is present with the wrong JSON type
    #[error("field `{field}` is not a {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// A depth level is not a `[price, quantity]` pair of decimal strings
    #[error("invalid {side} level at index {index}: {reason}")]
    InvalidLevel {
        side: BookSide,
        index: usize,
        reason: String,
    },
}

/// The user-data discriminator could not be mapped to a known shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnroutableDiscriminator {
    #[error("event type field is missing")]
    Missing,

    #[error("event type field is empty")]
    Empty,

    #[error("event type field is not a string: {0}")]
    NotAString(String),

    #[error("unknown event type `{0}`")]
    Unknown(String),
}

/// Why a raw message produced no event. Never terminal for a subscription.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Structural failure
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Classification failure on a multiplexed stream
    #[error(transparent)]
    Unroutable(#[from] UnroutableDiscriminator),

    /// Recognised event type that this subscription does not carry
    #[error("event type `{event_type}` is not carried by this subscription")]
    Filtered { event_type: &'static str },
}

impl DispatchError {
    /// Check if the message failed classification rather than decoding
    pub fn is_unroutable(&self) -> bool {
        matches!(self, DispatchError::Unroutable(_))
    }

    /// Check if the message was well-formed but meant for another shape
    pub fn is_filtered(&self) -> bool {
        matches!(self, DispatchError::Filtered { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_transport() {
        assert!(StreamError::transport("connection reset").is_transport());
        assert!(StreamError::ConnectTimeout { duration_ms: 10_000 }.is_transport());
        assert!(!StreamError::InvalidParameter("symbol".to_string()).is_transport());
        assert!(!StreamError::Config("base_url".to_string()).is_transport());
    }

    #[test]
    fn test_transport_error_message() {
        let err = StreamError::transport("connection reset by peer");
        assert_eq!(err.to_string(), "Transport error: connection reset by peer");
    }

    #[test]
    fn test_dispatch_error_classification() {
        let unroutable: DispatchError = UnroutableDiscriminator::Unknown("unknownType".into()).into();
        assert!(unroutable.is_unroutable());
        assert!(!unroutable.is_filtered());

        let decode: DispatchError = DecodeError::MissingField("b").into();
        assert!(!decode.is_unroutable());
        assert_eq!(decode.to_string(), "missing required field `b`");

        let filtered = DispatchError::Filtered {
            event_type: "outboundAccountInfo",
        };
        assert!(filtered.is_filtered());
    }

    #[test]
    fn test_invalid_level_message() {
        let err = DecodeError::InvalidLevel {
            side: BookSide::Ask,
            index: 2,
            reason: "expected 2 entries, got 3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid ask level at index 2: expected 2 entries, got 3"
        );
    }
}
