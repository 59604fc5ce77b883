//! WebSocket [`Connector`] built on tokio-tungstenite.
//!
//! Each socket runs as one tokio task that owns the stream. The task reports
//! lifecycle events through the [`EventSink`] and takes outgoing frames and
//! close requests from an unbounded channel fed by the [`SocketHandle`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::transport::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, Connector, EventSink, InboundFrame, SocketEvent, SocketHandle,
    TransportError,
};

/// How long to wait for the peer to answer our close frame before giving up
/// on the handshake and reporting the close anyway.
pub const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

enum Outgoing {
    Frame(Vec<u8>),
    Close { code: u16, reason: String },
}

/// Opens real WebSocket connections on a tokio runtime.
#[derive(Debug, Clone)]
pub struct WsConnector {
    runtime: Handle,
}

impl WsConnector {
    /// Spawn socket tasks on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime of the calling context, if there is one.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn SocketHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.runtime.spawn(run_socket(url.to_string(), sink, rx));
        Box::new(WsHandle { tx })
    }
}

struct WsHandle {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl SocketHandle for WsHandle {
    fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.tx
            .send(Outgoing::Frame(bytes))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

fn closed(code: u16, reason: impl Into<String>) -> SocketEvent {
    SocketEvent::Closed {
        code,
        reason: reason.into(),
    }
}

/// Wait for a close request while the handshake is still in flight. Frames
/// queued before open are discarded. `None` means the handle was dropped.
async fn wait_for_close(outgoing: &mut mpsc::UnboundedReceiver<Outgoing>) -> Option<(u16, String)> {
    loop {
        match outgoing.recv().await? {
            Outgoing::Close { code, reason } => return Some((code, reason)),
            Outgoing::Frame(bytes) => {
                tracing::warn!("Discarding {} byte frame sent before open", bytes.len());
            }
        }
    }
}

async fn run_socket(url: String, sink: EventSink, mut outgoing: mpsc::UnboundedReceiver<Outgoing>) {
    let socket = sink.socket();
    tracing::debug!("Socket {socket:?} connecting to {url}");

    let stream = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                tracing::debug!("Socket {socket:?} failed to connect: {e}");
                sink.emit(SocketEvent::Error(e.to_string()));
                sink.emit(closed(CLOSE_ABNORMAL, ""));
                return;
            }
        },
        request = wait_for_close(&mut outgoing) => {
            if let Some((code, reason)) = request {
                sink.emit(closed(code, reason));
            }
            return;
        }
    };

    sink.emit(SocketEvent::Open);
    let (mut write, mut read) = stream.split();
    let mut close_requested: Option<(u16, String)> = None;
    let close_timer = tokio::time::sleep(CLOSE_HANDSHAKE_TIMEOUT);
    tokio::pin!(close_timer);

    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(WsMessage::Binary(bytes))) => {
                    sink.emit(SocketEvent::Frame(InboundFrame::Binary(bytes)));
                }
                Some(Ok(WsMessage::Text(text))) => {
                    sink.emit(SocketEvent::Frame(InboundFrame::Text(text)));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    let _ = write.close().await;
                    sink.emit(closed(code, reason));
                    return;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    match close_requested.take() {
                        Some((code, reason)) => sink.emit(closed(code, reason)),
                        None => {
                            sink.emit(SocketEvent::Error(e.to_string()));
                            sink.emit(closed(CLOSE_ABNORMAL, ""));
                        }
                    }
                    return;
                }
                None => {
                    let (code, reason) = close_requested
                        .take()
                        .unwrap_or((CLOSE_ABNORMAL, String::new()));
                    sink.emit(closed(code, reason));
                    return;
                }
            },
            request = outgoing.recv(), if close_requested.is_none() => match request {
                Some(Outgoing::Frame(bytes)) => {
                    if let Err(e) = write.send(WsMessage::Binary(bytes)).await {
                        sink.emit(SocketEvent::Error(e.to_string()));
                        sink.emit(closed(CLOSE_ABNORMAL, ""));
                        return;
                    }
                }
                Some(Outgoing::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if write.send(WsMessage::Close(Some(frame))).await.is_err() {
                        sink.emit(closed(code, reason));
                        return;
                    }
                    close_timer.as_mut().reset(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
                    close_requested = Some((code, reason));
                }
                None => {
                    // Handle dropped: nobody is listening any more.
                    let _ = write.close().await;
                    return;
                }
            },
            () = &mut close_timer, if close_requested.is_some() => {
                tracing::debug!("Socket {socket:?} peer never answered our close");
                if let Some((code, reason)) = close_requested.take() {
                    sink.emit(closed(code, reason));
                }
                return;
            }
        }
    }
}
