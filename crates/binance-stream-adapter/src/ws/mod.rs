/*
[INPUT]:  StreamConfig, Connector and subscription handlers
[OUTPUT]: Decoded market and user-data events delivered per subscription
[POS]:    WebSocket layer - connection, decoding and dispatch
[UPDATE]: When adding logical streams or changing dispatch behavior
*/

pub mod client;
pub mod connection;
pub mod decode;
pub mod depth;
pub mod dispatch;
pub mod stream;
pub mod subscription;
pub mod user_data;

pub use client::StreamClient;
pub use connection::{Connector, RawMessage, RawMessageStream, TungsteniteConnector, receiver_stream};
pub use decode::{
    AggTradeDecoder, EventDecoder, KlineDecoder, RawPassthrough, StructuralDecoder,
    decode_structural,
};
pub use depth::{DepthDecoder, decode_depth};
pub use dispatch::{DispatchStats, DispatchStatsSnapshot, SubscriptionState};
pub use stream::StreamKind;
pub use subscription::SubscriptionHandle;
pub use user_data::{
    UserAccountDecoder, UserDataDecoder, UserDataKind, UserTradeDecoder, decode_user_data,
    probe_event_type, route_user_data,
};
