//! Client-side networking for Tread: the wire codec, connection lifecycle with
//! reconnection, typed message dispatch and latency measurement.

pub mod clock;
pub mod connection;
pub mod dispatcher;
pub mod endpoint;
pub mod events;
pub mod latency;
pub mod loopback;
pub mod messages;
pub mod reconnection;
pub mod transport;
pub mod validation;
pub mod world;
pub mod ws;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use connection::{
    ConnectionConfig, ConnectionError, ConnectionManager, ConnectionState, PendingConnect,
};
pub use dispatcher::MessageDispatcher;
pub use endpoint::{EndpointError, resolve_server_url, server_url_from_origin};
pub use events::{ClientEvent, CloseInfo, EventBus, EventKind, SubscriptionId};
pub use latency::{LatencyConfig, LatencyStats, LatencyTracker};
pub use loopback::LoopbackConnector;
pub use messages::{
    ChatText, CodecError, Envelope, InputIntent, JoinRequest, JoinResponse, Message, MessageKind,
    PROTOCOL_VERSION, Payload, PingProbe, PongEcho, WorldSnapshot, decode_envelope,
    encode_envelope,
};
pub use reconnection::{ReconnectConfig, ReconnectPolicy, ScheduledReconnect};
pub use transport::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, Connector, EventSink, InboundFrame,
    SocketEvent, SocketHandle, SocketId, TransportError,
};
pub use validation::{ValidationError, validate_outbound};
pub use ws::{CLOSE_HANDSHAKE_TIMEOUT, WsConnector};
