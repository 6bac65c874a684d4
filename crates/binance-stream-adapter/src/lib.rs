/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Binance stream adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod config;
pub mod error;
pub mod types;
pub mod ws;

pub use config::{DEFAULT_BASE_URL, StreamConfig};

pub use error::{
    BookSide,
    DecodeError,
    DispatchError,
    Result,
    StreamError,
    UnroutableDiscriminator,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    Connector,
    DispatchStatsSnapshot,
    EventDecoder,
    RawMessage,
    RawMessageStream,
    StreamClient,
    StreamKind,
    SubscriptionHandle,
    SubscriptionState,
    TungsteniteConnector,
    UserDataKind,
};
