//! Connection lifecycle: open, close, error handling and reconnection.
//!
//! [`ConnectionManager`] owns exactly one logical connection. It is
//! poll-driven: sockets queue their events on a channel and [`poll`] drains
//! them in delivery order, expires a pending open timeout, then fires a due
//! reconnection. Lifecycle changes are published on the manager's
//! [`EventBus`].
//!
//! [`poll`]: ConnectionManager::poll

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::clock::SharedClock;
use crate::events::{ClientEvent, CloseInfo, EventBus};
use crate::reconnection::{ReconnectConfig, ReconnectPolicy, ScheduledReconnect};
use crate::transport::{
    CLOSE_NORMAL, Connector, EventSink, InboundFrame, SocketEvent, SocketHandle, SocketId,
    TransportError,
};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, nothing scheduled.
    Disconnected,
    /// A socket is opening.
    Connecting,
    /// The socket is open.
    Connected,
    /// Waiting for a scheduled reconnection to fire.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long `connect` waits for the socket to open. Default: 5 s.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(5000),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Why a [`PendingConnect`] failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The socket did not open in time. The socket itself is left alone.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// The transport reported an error before the socket opened.
    #[error("transport error: {0}")]
    Transport(String),

    /// The socket closed before it ever opened.
    #[error("socket closed before opening (code {code})")]
    ClosedBeforeOpen { code: u16 },

    /// A newer `connect` call replaced this attempt.
    #[error("superseded by a newer connection attempt")]
    Superseded,

    /// The manager was dropped or `disconnect` was called first.
    #[error("connection attempt abandoned")]
    Abandoned,
}

type ConnectResult = Result<(), ConnectionError>;

/// Completion of one [`ConnectionManager::connect`] call.
///
/// Resolves only while the manager is being polled.
#[derive(Debug)]
pub struct PendingConnect {
    rx: oneshot::Receiver<ConnectResult>,
}

impl PendingConnect {
    /// Non-blocking check. `None` while the attempt is still in flight.
    /// A result can only be taken once.
    pub fn try_result(&mut self) -> Option<ConnectResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ConnectionError::Abandoned)),
        }
    }
}

impl Future for PendingConnect {
    type Output = ConnectResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ConnectionError::Abandoned)))
    }
}

struct ActiveSocket {
    id: SocketId,
    url: String,
    handle: Box<dyn SocketHandle>,
}

struct PendingOpen {
    socket: SocketId,
    deadline_ms: u64,
    waiter: Option<oneshot::Sender<ConnectResult>>,
}

impl PendingOpen {
    fn settle(mut self, result: ConnectResult) {
        if let Some(tx) = self.waiter.take() {
            let _ = tx.send(result);
        }
    }
}

/// Owns one logical connection and its reconnection policy.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    clock: SharedClock,
    config: ConnectionConfig,
    state: ConnectionState,
    policy: ReconnectPolicy,
    socket: Option<ActiveSocket>,
    pending_open: Option<PendingOpen>,
    reconnect: Option<ScheduledReconnect>,
    next_socket_id: u64,
    events_tx: mpsc::UnboundedSender<(SocketId, SocketEvent)>,
    events_rx: mpsc::UnboundedReceiver<(SocketId, SocketEvent)>,
    bus: EventBus,
}

impl ConnectionManager {
    pub fn new(connector: Box<dyn Connector>, clock: SharedClock, config: ConnectionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            clock,
            policy: ReconnectPolicy::new(config.reconnect.clone()),
            config,
            state: ConnectionState::Disconnected,
            socket: None,
            pending_open: None,
            reconnect: None,
            next_socket_id: 0,
            events_tx,
            events_rx,
            bus: EventBus::new(),
        }
    }

    /// Open a socket to `url`.
    ///
    /// An attempt already in flight is superseded: its socket is closed and
    /// its [`PendingConnect`] fails with [`ConnectionError::Superseded`]. A
    /// scheduled reconnection is cancelled.
    pub fn connect(&mut self, url: &str) -> PendingConnect {
        let (tx, rx) = oneshot::channel();
        if let Some(scheduled) = self.reconnect.take() {
            tracing::debug!("Manual connect replaces reconnect attempt {}", scheduled.attempt);
        }
        self.open_socket(url, Some(tx));
        PendingConnect { rx }
    }

    /// Request a clean close and cancel any scheduled reconnection.
    ///
    /// The attempt counter is left as is; only a successful open resets it.
    pub fn disconnect(&mut self) {
        if let Some(scheduled) = self.reconnect.take() {
            tracing::info!("Cancelled reconnect attempt {}", scheduled.attempt);
        }
        match &self.socket {
            Some(socket) => {
                tracing::info!("Disconnecting from {}", socket.url);
                socket.handle.close(CLOSE_NORMAL, "Client disconnect");
            }
            None => self.state = ConnectionState::Disconnected,
        }
    }

    /// Drain queued socket events, expire the open timeout and fire a due
    /// reconnection. Each inbound frame is handed to `on_frame`; when it
    /// returns an event, that event is published before the next socket
    /// event is processed.
    pub fn poll<F>(&mut self, mut on_frame: F)
    where
        F: FnMut(InboundFrame) -> Option<ClientEvent>,
    {
        while let Ok((id, event)) = self.events_rx.try_recv() {
            if self.socket.as_ref().map(|s| s.id) != Some(id) {
                tracing::trace!("Ignoring {event:?} from stale socket {id:?}");
                continue;
            }
            match event {
                SocketEvent::Open => self.on_open(),
                SocketEvent::Frame(frame) => {
                    if let Some(event) = on_frame(frame) {
                        self.bus.emit(&event);
                    }
                }
                SocketEvent::Error(detail) => self.on_error(id, detail),
                SocketEvent::Closed { code, reason } => self.on_close(id, code, reason),
            }
        }

        let now = self.clock.now_ms();
        if self
            .pending_open
            .as_ref()
            .is_some_and(|pending| now >= pending.deadline_ms)
            && let Some(pending) = self.pending_open.take()
        {
            tracing::warn!(
                "Socket did not open within {:?}",
                self.config.connect_timeout
            );
            pending.settle(Err(ConnectionError::Timeout(self.config.connect_timeout)));
        }

        if self.reconnect.as_ref().is_some_and(|r| r.is_due(now))
            && let Some(scheduled) = self.reconnect.take()
        {
            if self.state == ConnectionState::Connected {
                tracing::debug!("Skipping reconnect attempt {}: already connected", scheduled.attempt);
            } else {
                tracing::info!(
                    "Reconnect attempt {}/{} to {}",
                    scheduled.attempt,
                    self.config.reconnect.max_attempts,
                    scheduled.url
                );
                self.open_socket(&scheduled.url, None);
            }
        }
    }

    /// Send a binary frame on the open socket.
    pub fn send_frame(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        match (&self.socket, self.state) {
            (Some(socket), ConnectionState::Connected) => socket.handle.send(bytes),
            _ => Err(TransportError::NotOpen),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Reconnection attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.policy.attempts()
    }

    /// The reconnection waiting to fire, if any.
    pub fn scheduled_reconnect(&self) -> Option<&ScheduledReconnect> {
        self.reconnect.as_ref()
    }

    /// URL of the current socket.
    pub fn url(&self) -> Option<&str> {
        self.socket.as_ref().map(|s| s.url.as_str())
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    fn open_socket(&mut self, url: &str, waiter: Option<oneshot::Sender<ConnectResult>>) {
        if let Some(old) = self.socket.take() {
            tracing::debug!("Superseding socket {:?} to {}", old.id, old.url);
            old.handle.close(CLOSE_NORMAL, "Superseded");
        }
        if let Some(pending) = self.pending_open.take() {
            pending.settle(Err(ConnectionError::Superseded));
        }

        let id = SocketId(self.next_socket_id);
        self.next_socket_id += 1;
        let sink = EventSink::new(id, self.events_tx.clone());

        tracing::info!("Connecting to {url}");
        self.state = ConnectionState::Connecting;
        let handle = self.connector.open(url, sink);
        self.socket = Some(ActiveSocket {
            id,
            url: url.to_string(),
            handle,
        });
        self.pending_open = Some(PendingOpen {
            socket: id,
            deadline_ms: self
                .clock
                .now_ms()
                .saturating_add(self.config.connect_timeout.as_millis() as u64),
            waiter,
        });
    }

    fn on_open(&mut self) {
        self.policy.reset();
        self.reconnect = None;
        self.state = ConnectionState::Connected;
        if let Some(pending) = self.pending_open.take() {
            pending.settle(Ok(()));
        }
        if let Some(socket) = &self.socket {
            tracing::info!("Connected to {}", socket.url);
        }
        self.bus.emit(&ClientEvent::Connected);
    }

    fn on_error(&mut self, id: SocketId, detail: String) {
        tracing::warn!("Socket error: {detail}");
        if self.pending_open.as_ref().is_some_and(|p| p.socket == id)
            && let Some(pending) = self.pending_open.take()
        {
            pending.settle(Err(ConnectionError::Transport(detail.clone())));
        }
        self.bus.emit(&ClientEvent::Error { detail });
    }

    fn on_close(&mut self, id: SocketId, code: u16, reason: String) {
        let url = match self.socket.take() {
            Some(socket) => socket.url,
            None => return,
        };
        self.state = ConnectionState::Disconnected;
        if self.pending_open.as_ref().is_some_and(|p| p.socket == id)
            && let Some(pending) = self.pending_open.take()
        {
            pending.settle(Err(ConnectionError::ClosedBeforeOpen { code }));
        }

        tracing::info!("Disconnected (code {code}): {reason}");
        self.bus.emit(&ClientEvent::Disconnected(CloseInfo { code, reason }));

        if code == CLOSE_NORMAL {
            return;
        }
        match self.policy.next_delay() {
            Some(delay) => {
                let scheduled = ScheduledReconnect {
                    attempt: self.policy.attempts(),
                    due_at_ms: self
                        .clock
                        .now_ms()
                        .saturating_add(delay.as_millis() as u64),
                    url,
                };
                tracing::info!(
                    "Reconnecting in {:?} (attempt {}/{})",
                    delay,
                    scheduled.attempt,
                    self.config.reconnect.max_attempts
                );
                self.reconnect = Some(scheduled);
                self.state = ConnectionState::Reconnecting;
            }
            None => {
                tracing::warn!(
                    "Giving up after {} reconnect attempts; staying disconnected",
                    self.policy.attempts()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::events::EventKind;
    use crate::loopback::LoopbackConnector;
    use crate::transport::CLOSE_ABNORMAL;
    use std::cell::RefCell;
    use std::rc::Rc;

    const URL: &str = "ws://127.0.0.1:8080";

    fn manager() -> (ConnectionManager, LoopbackConnector, ManualClock) {
        let connector = LoopbackConnector::new();
        let clock = ManualClock::new(10_000);
        let manager = ConnectionManager::new(
            Box::new(connector.clone()),
            clock.shared(),
            ConnectionConfig::default(),
        );
        (manager, connector, clock)
    }

    fn poll(manager: &mut ConnectionManager) {
        manager.poll(|_| None);
    }

    fn record(manager: &mut ConnectionManager, kind: EventKind) -> Rc<RefCell<Vec<ClientEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        manager
            .events_mut()
            .on(kind, move |event| sink.borrow_mut().push(event.clone()));
        log
    }

    #[test]
    fn test_connect_transitions_and_publishes_once() {
        let (mut mgr, connector, _clock) = manager();
        let connected = record(&mut mgr, EventKind::Connected);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);

        let mut pending = mgr.connect(URL);
        assert_eq!(mgr.state(), ConnectionState::Connecting);
        assert_eq!(pending.try_result(), None);

        connector.accept();
        poll(&mut mgr);
        assert_eq!(mgr.state(), ConnectionState::Connected);
        assert_eq!(pending.try_result(), Some(Ok(())));
        assert_eq!(connected.borrow().len(), 1);

        poll(&mut mgr);
        assert_eq!(connected.borrow().len(), 1);
    }

    #[test]
    fn test_abnormal_close_schedules_reconnect_one_second_later() {
        let (mut mgr, connector, clock) = manager();
        let disconnected = record(&mut mgr, EventKind::Disconnected);
        let _pending = mgr.connect(URL);
        connector.accept();
        poll(&mut mgr);

        connector.close(CLOSE_ABNORMAL, "");
        poll(&mut mgr);

        assert_eq!(
            *disconnected.borrow(),
            vec![ClientEvent::Disconnected(CloseInfo {
                code: 1006,
                reason: String::new()
            })]
        );
        assert_eq!(mgr.state(), ConnectionState::Reconnecting);
        let scheduled = mgr.scheduled_reconnect().unwrap();
        assert_eq!(scheduled.attempt, 1);
        assert_eq!(scheduled.due_at_ms, clock.now_ms() + 1000);

        clock.advance(999);
        poll(&mut mgr);
        assert_eq!(connector.open_count(), 1);

        clock.advance(1);
        poll(&mut mgr);
        assert_eq!(connector.open_count(), 2);
        assert_eq!(mgr.state(), ConnectionState::Connecting);
        assert_eq!(connector.urls()[1], URL);
    }

    #[test]
    fn test_backoff_schedule_over_five_failures() {
        let (mut mgr, connector, clock) = manager();
        let _pending = mgr.connect(URL);

        let mut delays = Vec::new();
        for _ in 0..5 {
            connector.close(CLOSE_ABNORMAL, "");
            poll(&mut mgr);
            let scheduled = mgr.scheduled_reconnect().cloned().unwrap();
            delays.push(scheduled.due_at_ms - clock.now_ms());
            clock.set(scheduled.due_at_ms);
            poll(&mut mgr);
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);

        connector.close(CLOSE_ABNORMAL, "");
        poll(&mut mgr);
        assert!(mgr.scheduled_reconnect().is_none(), "no sixth attempt");
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(connector.open_count(), 6);
    }

    #[test]
    fn test_open_resets_attempts() {
        let (mut mgr, connector, clock) = manager();
        let _pending = mgr.connect(URL);
        connector.close(CLOSE_ABNORMAL, "");
        poll(&mut mgr);
        clock.advance(1000);
        poll(&mut mgr);
        assert_eq!(mgr.attempts(), 1);

        connector.accept();
        poll(&mut mgr);
        assert_eq!(mgr.attempts(), 0);
        assert_eq!(mgr.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_clean_close_does_not_reconnect() {
        let (mut mgr, connector, _clock) = manager();
        let _pending = mgr.connect(URL);
        connector.accept();
        poll(&mut mgr);

        connector.close(CLOSE_NORMAL, "server shutdown");
        poll(&mut mgr);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(mgr.scheduled_reconnect().is_none());
    }

    #[test]
    fn test_disconnect_closes_cleanly_and_cancels_reconnect() {
        let (mut mgr, connector, clock) = manager();
        let _pending = mgr.connect(URL);
        connector.accept();
        poll(&mut mgr);

        mgr.disconnect();
        assert_eq!(
            connector.close_requests(),
            vec![(1000, "Client disconnect".to_string())]
        );
        poll(&mut mgr);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);

        // Abnormal close, then disconnect before the timer fires.
        let _pending = mgr.connect(URL);
        connector.close(CLOSE_ABNORMAL, "");
        poll(&mut mgr);
        assert!(mgr.scheduled_reconnect().is_some());
        mgr.disconnect();
        assert!(mgr.scheduled_reconnect().is_none());
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(mgr.attempts(), 1, "disconnect keeps backoff history");

        clock.advance(60_000);
        poll(&mut mgr);
        assert_eq!(connector.open_count(), 2);
    }

    #[test]
    fn test_open_timeout_rejects_waiter() {
        let (mut mgr, _connector, clock) = manager();
        let mut pending = mgr.connect(URL);
        clock.advance(4_999);
        poll(&mut mgr);
        assert_eq!(pending.try_result(), None);

        clock.advance(1);
        poll(&mut mgr);
        assert_eq!(
            pending.try_result(),
            Some(Err(ConnectionError::Timeout(Duration::from_millis(5000))))
        );
        assert_eq!(mgr.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_error_before_open_rejects_and_publishes() {
        let (mut mgr, connector, _clock) = manager();
        let errors = record(&mut mgr, EventKind::Error);
        let mut pending = mgr.connect(URL);

        connector.fail("connection refused");
        poll(&mut mgr);
        assert_eq!(
            pending.try_result(),
            Some(Err(ConnectionError::Transport("connection refused".into())))
        );
        assert_eq!(errors.borrow().len(), 1);
        assert_eq!(
            mgr.state(),
            ConnectionState::Connecting,
            "errors alone do not change state"
        );
    }

    #[test]
    fn test_close_before_open_rejects() {
        let (mut mgr, connector, _clock) = manager();
        let mut pending = mgr.connect(URL);
        connector.close(1002, "protocol error");
        poll(&mut mgr);
        assert_eq!(
            pending.try_result(),
            Some(Err(ConnectionError::ClosedBeforeOpen { code: 1002 }))
        );
    }

    #[test]
    fn test_second_connect_supersedes_first() {
        let (mut mgr, connector, _clock) = manager();
        let connected = record(&mut mgr, EventKind::Connected);
        let disconnected = record(&mut mgr, EventKind::Disconnected);

        let mut first = mgr.connect(URL);
        let mut second = mgr.connect("ws://127.0.0.1:9090");
        assert_eq!(first.try_result(), Some(Err(ConnectionError::Superseded)));

        connector.accept();
        poll(&mut mgr);
        assert_eq!(second.try_result(), Some(Ok(())));
        assert_eq!(connected.borrow().len(), 1);
        assert!(
            disconnected.borrow().is_empty(),
            "close of the superseded socket is not published"
        );
        assert_eq!(mgr.url(), Some("ws://127.0.0.1:9090"));
    }

    #[test]
    fn test_send_requires_open_socket() {
        let (mut mgr, connector, _clock) = manager();
        assert_eq!(mgr.send_frame(vec![1]), Err(TransportError::NotOpen));
        let _pending = mgr.connect(URL);
        assert_eq!(mgr.send_frame(vec![1]), Err(TransportError::NotOpen));
        connector.accept();
        poll(&mut mgr);
        assert_eq!(mgr.send_frame(vec![1]), Ok(()));
        assert_eq!(connector.sent_frames(), vec![vec![1]]);
    }

    #[test]
    fn test_frames_are_handed_to_callback_in_order() {
        let (mut mgr, connector, _clock) = manager();
        let _pending = mgr.connect(URL);
        connector.accept();
        connector.deliver(vec![1]);
        connector.deliver(vec![2]);

        let mut seen = Vec::new();
        mgr.poll(|frame| {
            seen.push(frame);
            None
        });
        assert_eq!(
            seen,
            vec![InboundFrame::Binary(vec![1]), InboundFrame::Binary(vec![2])]
        );
    }

    #[tokio::test]
    async fn test_pending_connect_is_awaitable() {
        let (mut mgr, connector, _clock) = manager();
        let pending = mgr.connect(URL);
        connector.accept();
        poll(&mut mgr);
        assert_eq!(pending.await, Ok(()));

        let pending = mgr.connect(URL);
        drop(mgr);
        assert_eq!(pending.await, Err(ConnectionError::Abandoned));
    }
}
