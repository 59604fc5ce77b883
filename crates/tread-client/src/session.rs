//! The client's owning context.
//!
//! [`GameSession`] holds the dispatcher, the input sampler, the transmission
//! scheduler and the latency tracker, and wires them together once per frame.
//! Event handlers registered at construction record what the server told us
//! (identity, match settings, the latest world snapshot) in state shared with
//! the session.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tread_config::Config;
use tread_input::{BindingError, InputSampler, KeyMap, SurfaceRect};
use tread_net::world::GameConfig;
use tread_net::{
    ChatText, ClientEvent, CloseInfo, ConnectionConfig, ConnectionManager, ConnectionState,
    Connector, EventKind, JoinResponse, LatencyConfig, LatencyStats, LatencyTracker,
    MessageDispatcher, PendingConnect, PongEcho, ReconnectConfig, SharedClock, WorldSnapshot,
};

use crate::scheduler::TransmissionScheduler;

/// Chat lines kept for display.
pub const CHAT_HISTORY: usize = 50;

/// Session-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub display_name: String,
    pub client_version: String,
    /// Spacing between latency probes.
    pub probe_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "WebClient".to_string(),
            client_version: "1.0.0".to_string(),
            probe_interval_ms: 2000,
        }
    }
}

/// Who the server says we are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub player_id: String,
    pub entity_id: u32,
}

/// Debug snapshot for the HUD.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub player_id: Option<String>,
    pub latency: LatencyStats,
    pub snapshots_received: u64,
    pub last_tick: Option<u64>,
    pub inputs_sent: u64,
    pub input_sequence: u32,
    pub frames_dropped: u64,
}

#[derive(Default)]
struct SharedState {
    join_pending: bool,
    identity: Option<PlayerIdentity>,
    game_config: Option<GameConfig>,
    latest_snapshot: Option<WorldSnapshot>,
    snapshots_received: u64,
    pongs: Vec<PongEcho>,
    chat: VecDeque<ChatText>,
    last_close: Option<CloseInfo>,
}

pub struct GameSession {
    dispatcher: MessageDispatcher,
    sampler: InputSampler,
    scheduler: TransmissionScheduler,
    latency: LatencyTracker,
    shared: Rc<RefCell<SharedState>>,
    config: SessionConfig,
    last_probe_at: Option<u64>,
}

impl GameSession {
    pub fn new(
        mut dispatcher: MessageDispatcher,
        sampler: InputSampler,
        scheduler: TransmissionScheduler,
        latency: LatencyConfig,
        config: SessionConfig,
    ) -> Self {
        let latency = LatencyTracker::new(latency, dispatcher.connection().clock().clone());
        let shared = Rc::new(RefCell::new(SharedState::default()));
        subscribe(&mut dispatcher, &shared);
        Self {
            dispatcher,
            sampler,
            scheduler,
            latency,
            shared,
            config,
            last_probe_at: None,
        }
    }

    /// Build a session from loaded settings.
    pub fn from_config(
        config: &Config,
        connector: Box<dyn Connector>,
        clock: SharedClock,
    ) -> Result<Self, BindingError> {
        let connection = ConnectionConfig {
            connect_timeout: Duration::from_millis(config.network.connect_timeout_ms),
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(config.network.reconnect_base_delay_ms),
                max_attempts: config.network.max_reconnect_attempts,
            },
        };
        let dispatcher = MessageDispatcher::new(ConnectionManager::new(connector, clock, connection));

        let bindings = KeyMap::from_overrides(&config.input.keybindings)?;
        let surface = SurfaceRect::sized(config.input.surface_width, config.input.surface_height);
        let sampler = InputSampler::new(bindings, surface)
            .with_angle_threshold(config.input.angle_threshold_rad);

        Ok(Self::new(
            dispatcher,
            sampler,
            TransmissionScheduler::new(config.input.send_interval_ms),
            LatencyConfig {
                window_size: config.latency.window_size,
            },
            SessionConfig {
                display_name: config.player.display_name.clone(),
                client_version: config.player.client_version.clone(),
                probe_interval_ms: config.latency.probe_interval_ms,
            },
        ))
    }

    pub fn connect(&mut self, url: &str) -> PendingConnect {
        self.dispatcher.connect(url)
    }

    pub fn disconnect(&mut self) {
        self.dispatcher.disconnect();
    }

    /// One frame of work: drain the socket, join if a connection just
    /// opened, send pending input if the gate allows, and probe latency when
    /// due. Returns whether an input message was sent.
    pub fn frame(&mut self) -> bool {
        self.dispatcher.poll();

        let pongs = std::mem::take(&mut self.shared.borrow_mut().pongs);
        for echo in &pongs {
            let rtt = self.latency.on_pong(echo);
            tracing::trace!("RTT {} ms", rtt.as_millis());
        }

        if !self.dispatcher.is_connected() {
            return false;
        }

        // One join attempt per connection.
        let join_pending = std::mem::take(&mut self.shared.borrow_mut().join_pending);
        if join_pending {
            if self
                .dispatcher
                .join_game(&self.config.display_name, &self.config.client_version)
            {
                tracing::info!("Joining as {}", self.config.display_name);
            } else {
                tracing::error!(
                    "Could not send join request as {:?} (client {:?})",
                    self.config.display_name,
                    self.config.client_version
                );
            }
        }

        let now = self.dispatcher.now_ms();
        let sent = self
            .scheduler
            .step(now, &mut self.sampler, &mut self.dispatcher);

        let probe_due = self
            .last_probe_at
            .is_none_or(|last| now.saturating_sub(last) >= self.config.probe_interval_ms);
        if probe_due && self.latency.send_probe(&mut self.dispatcher) {
            self.last_probe_at = Some(now);
        }

        sent
    }

    /// Send a chat line under our current identity.
    pub fn send_chat(&mut self, message: &str) -> bool {
        let player_id = self
            .shared
            .borrow()
            .identity
            .as_ref()
            .map(|id| id.player_id.clone())
            .unwrap_or_default();
        let chat = ChatText {
            player_id,
            display_name: self.config.display_name.clone(),
            message: message.to_string(),
            sent_at: self.dispatcher.now_ms(),
        };
        self.dispatcher.send_chat(chat)
    }

    pub fn stats(&self) -> SessionStats {
        let shared = self.shared.borrow();
        SessionStats {
            state: self.dispatcher.state(),
            reconnect_attempts: self.dispatcher.connection().attempts(),
            player_id: shared.identity.as_ref().map(|id| id.player_id.clone()),
            latency: self.latency.snapshot(),
            snapshots_received: shared.snapshots_received,
            last_tick: shared.latest_snapshot.as_ref().map(|s| s.tick),
            inputs_sent: self.scheduler.sent(),
            input_sequence: self.sampler.sequence_number(),
            frames_dropped: self.dispatcher.frames_dropped(),
        }
    }

    /// Disconnected with no reconnection scheduled.
    pub fn is_idle(&self) -> bool {
        self.dispatcher.state() == ConnectionState::Disconnected
            && self.dispatcher.connection().scheduled_reconnect().is_none()
    }

    pub fn state(&self) -> ConnectionState {
        self.dispatcher.state()
    }

    pub fn is_connected(&self) -> bool {
        self.dispatcher.is_connected()
    }

    pub fn now_ms(&self) -> u64 {
        self.dispatcher.now_ms()
    }

    pub fn identity(&self) -> Option<PlayerIdentity> {
        self.shared.borrow().identity.clone()
    }

    pub fn game_config(&self) -> Option<GameConfig> {
        self.shared.borrow().game_config.clone()
    }

    pub fn latest_snapshot(&self) -> Option<WorldSnapshot> {
        self.shared.borrow().latest_snapshot.clone()
    }

    /// Most recent chat lines, oldest first.
    pub fn chat_history(&self) -> Vec<ChatText> {
        self.shared.borrow().chat.iter().cloned().collect()
    }

    pub fn last_close(&self) -> Option<CloseInfo> {
        self.shared.borrow().last_close.clone()
    }

    pub fn sampler(&self) -> &InputSampler {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut InputSampler {
        &mut self.sampler
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatcher
    }

    /// For registering extra handlers.
    pub fn dispatcher_mut(&mut self) -> &mut MessageDispatcher {
        &mut self.dispatcher
    }
}

fn subscribe(dispatcher: &mut MessageDispatcher, shared: &Rc<RefCell<SharedState>>) {
    let state = Rc::clone(shared);
    dispatcher.on(EventKind::Connected, move |_| {
        let mut state = state.borrow_mut();
        state.join_pending = true;
        state.identity = None;
    });

    let state = Rc::clone(shared);
    dispatcher.on(EventKind::Disconnected, move |event| {
        if let ClientEvent::Disconnected(info) = event {
            let mut state = state.borrow_mut();
            state.join_pending = false;
            state.last_close = Some(info.clone());
        }
    });

    dispatcher.on(EventKind::Error, |event| {
        if let ClientEvent::Error { detail } = event {
            tracing::debug!("Connection error reported: {detail}");
        }
    });

    let state = Rc::clone(shared);
    dispatcher.on_message(move |response: &JoinResponse| {
        if !response.success {
            tracing::error!("Join rejected: {}", response.error_message);
            return;
        }
        tracing::info!(
            "Joined as {} (entity {})",
            response.player_id,
            response.assigned_entity_id
        );
        let mut state = state.borrow_mut();
        state.identity = Some(PlayerIdentity {
            player_id: response.player_id.clone(),
            entity_id: response.assigned_entity_id,
        });
        if let Some(config) = &response.config {
            state.game_config = Some(config.clone());
        }
    });

    let state = Rc::clone(shared);
    dispatcher.on_message(move |snapshot: &WorldSnapshot| {
        let mut state = state.borrow_mut();
        state.snapshots_received += 1;
        state.latest_snapshot = Some(snapshot.clone());
    });

    let state = Rc::clone(shared);
    dispatcher.on_message(move |echo: &PongEcho| {
        state.borrow_mut().pongs.push(*echo);
    });

    let state = Rc::clone(shared);
    dispatcher.on_message(move |chat: &ChatText| {
        tracing::info!("[chat] {}: {}", chat.display_name, chat.message);
        let mut state = state.borrow_mut();
        if state.chat.len() >= CHAT_HISTORY {
            state.chat.pop_front();
        }
        state.chat.push_back(chat.clone());
    });
}
