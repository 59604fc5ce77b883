//! In-memory [`Connector`] for tests and headless tooling.
//!
//! Every socket opened through a [`LoopbackConnector`] is recorded. The
//! connector then plays the server: it can accept the latest socket, deliver
//! frames, report errors and close it. Frames the client sends and close
//! requests it makes are captured for inspection. Clones share state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::transport::{
    CLOSE_ABNORMAL, Connector, EventSink, InboundFrame, SocketEvent, SocketHandle, TransportError,
};

struct LoopbackSocket {
    url: String,
    sink: EventSink,
    sent: Vec<Vec<u8>>,
    close_requests: Vec<(u16, String)>,
    closed: bool,
}

#[derive(Default)]
struct LoopbackState {
    sockets: Vec<LoopbackSocket>,
}

/// Shared in-memory connector.
#[derive(Clone, Default)]
pub struct LoopbackConnector {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        lock(&self.state)
    }

    fn with_latest<R>(&self, f: impl FnOnce(&mut LoopbackSocket) -> R) -> Option<R> {
        self.lock().sockets.last_mut().map(f)
    }

    /// How many sockets have been opened.
    pub fn open_count(&self) -> usize {
        self.lock().sockets.len()
    }

    /// URLs of every socket opened, oldest first.
    pub fn urls(&self) -> Vec<String> {
        self.lock().sockets.iter().map(|s| s.url.clone()).collect()
    }

    /// Report the latest socket as open.
    pub fn accept(&self) -> bool {
        self.emit(SocketEvent::Open)
    }

    /// Deliver a binary frame on the latest socket.
    pub fn deliver(&self, bytes: Vec<u8>) -> bool {
        self.deliver_frame(InboundFrame::Binary(bytes))
    }

    /// Deliver a frame of any representation on the latest socket.
    pub fn deliver_frame(&self, frame: InboundFrame) -> bool {
        self.emit(SocketEvent::Frame(frame))
    }

    /// Report a transport error on the latest socket.
    pub fn fail(&self, detail: &str) -> bool {
        self.emit(SocketEvent::Error(detail.to_string()))
    }

    /// Close the latest socket from the server side.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.with_latest(|socket| {
            if socket.closed {
                return false;
            }
            socket.closed = true;
            socket.sink.emit(SocketEvent::Closed {
                code,
                reason: reason.to_string(),
            });
            true
        })
        .unwrap_or(false)
    }

    /// Drop the latest socket without a close frame.
    pub fn drop_connection(&self) -> bool {
        self.close(CLOSE_ABNORMAL, "")
    }

    /// Binary frames the client sent on the latest socket.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.with_latest(|socket| socket.sent.clone())
            .unwrap_or_default()
    }

    /// Binary frames the client sent across every socket, in order.
    pub fn all_sent_frames(&self) -> Vec<Vec<u8>> {
        self.lock()
            .sockets
            .iter()
            .flat_map(|s| s.sent.iter().cloned())
            .collect()
    }

    /// Close requests the client made on the latest socket.
    pub fn close_requests(&self) -> Vec<(u16, String)> {
        self.with_latest(|socket| socket.close_requests.clone())
            .unwrap_or_default()
    }

    fn emit(&self, event: SocketEvent) -> bool {
        self.with_latest(|socket| {
            if socket.closed {
                return false;
            }
            socket.sink.emit(event);
            true
        })
        .unwrap_or(false)
    }
}

impl Connector for LoopbackConnector {
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn SocketHandle> {
        let mut state = self.lock();
        state.sockets.push(LoopbackSocket {
            url: url.to_string(),
            sink,
            sent: Vec::new(),
            close_requests: Vec::new(),
            closed: false,
        });
        let index = state.sockets.len() - 1;
        tracing::debug!("Loopback socket {index} opening to {url}");
        Box::new(LoopbackHandle {
            state: Arc::clone(&self.state),
            index,
        })
    }
}

struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
    index: usize,
}

impl SocketHandle for LoopbackHandle {
    fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        let socket = state
            .sockets
            .get_mut(self.index)
            .ok_or(TransportError::Closed)?;
        if socket.closed {
            return Err(TransportError::Closed);
        }
        socket.sent.push(bytes);
        Ok(())
    }

    /// Records the request and completes the handshake immediately, as a
    /// cooperative peer would.
    fn close(&self, code: u16, reason: &str) {
        let mut state = lock(&self.state);
        let Some(socket) = state.sockets.get_mut(self.index) else {
            return;
        };
        socket.close_requests.push((code, reason.to_string()));
        if !socket.closed {
            socket.closed = true;
            socket.sink.emit(SocketEvent::Closed {
                code,
                reason: reason.to_string(),
            });
        }
    }
}

fn lock(state: &Mutex<LoopbackState>) -> MutexGuard<'_, LoopbackState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
