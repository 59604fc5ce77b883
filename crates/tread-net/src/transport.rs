//! The seam between [`ConnectionManager`](crate::ConnectionManager) and a
//! concrete socket implementation.
//!
//! A [`Connector`] opens sockets. Each socket reports its lifecycle through an
//! [`EventSink`] tagged with the [`SocketId`] the manager assigned, and is
//! driven through the returned [`SocketHandle`]. Events are queued on an
//! unbounded channel and drained by the manager's `poll`, so connector
//! implementations may run on other threads.

use tokio::sync::mpsc;

/// Clean shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close frame carried no status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Identifies one socket opened by a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(pub u64);

/// A frame as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Binary(Vec<u8>),
    Text(String),
}

impl InboundFrame {
    /// Size of the frame body in bytes.
    pub fn len(&self) -> usize {
        match self {
            InboundFrame::Binary(bytes) => bytes.len(),
            InboundFrame::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle notifications emitted by a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    Frame(InboundFrame),
    Error(String),
    Closed { code: u16, reason: String },
}

/// Where a socket reports its events.
#[derive(Debug, Clone)]
pub struct EventSink {
    socket: SocketId,
    tx: mpsc::UnboundedSender<(SocketId, SocketEvent)>,
}

impl EventSink {
    pub(crate) fn new(socket: SocketId, tx: mpsc::UnboundedSender<(SocketId, SocketEvent)>) -> Self {
        Self { socket, tx }
    }

    /// The socket this sink belongs to.
    pub fn socket(&self) -> SocketId {
        self.socket
    }

    /// Queue an event. Silently discarded once the manager is gone.
    pub fn emit(&self, event: SocketEvent) {
        let _ = self.tx.send((self.socket, event));
    }
}

/// Errors raised by [`SocketHandle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The socket has closed or its driver task has exited.
    #[error("socket is closed")]
    Closed,

    /// No socket is currently open.
    #[error("no open socket")]
    NotOpen,
}

/// Opens sockets.
pub trait Connector {
    /// Begin opening a socket to `url`. Progress is reported through `sink`;
    /// this call itself never blocks.
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn SocketHandle>;
}

/// Control surface of one open (or opening) socket.
pub trait SocketHandle {
    /// Queue a binary frame.
    fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Request a close handshake. The socket reports `Closed` when done.
    fn close(&self, code: u16, reason: &str);
}
