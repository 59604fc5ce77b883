//! Encode/validate on the way out, decode/publish on the way in.
//!
//! [`MessageDispatcher`] sits on top of a [`ConnectionManager`]. Outbound
//! messages are stamped with the clock, validated, encoded and written to the
//! socket; `send` reports failure as `false` and never transmits a partial
//! result. Inbound binary frames are decoded and published under their
//! [`MessageKind`]. Frames that fail to decode are logged and dropped without
//! affecting the connection.

use crate::connection::{ConnectionManager, ConnectionState, PendingConnect};
use crate::events::{ClientEvent, EventBus, EventKind, SubscriptionId};
use crate::messages::{
    ChatText, Envelope, InputIntent, JoinRequest, Message, Payload, PingProbe, decode_envelope,
    encode_envelope,
};
use crate::transport::InboundFrame;
use crate::validation::validate_outbound;

/// Typed send/receive surface over one connection.
pub struct MessageDispatcher {
    connection: ConnectionManager,
    frames_dropped: u64,
}

impl MessageDispatcher {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            frames_dropped: 0,
        }
    }

    pub fn connect(&mut self, url: &str) -> PendingConnect {
        self.connection.connect(url)
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Current clock reading, the same one used to stamp envelopes.
    pub fn now_ms(&self) -> u64 {
        self.connection.clock().now_ms()
    }

    /// Validate, encode and transmit `message`.
    ///
    /// Returns `false` with no side effects if the connection is not open or
    /// the message fails validation.
    pub fn send(&mut self, message: impl Into<Message>) -> bool {
        if !self.connection.is_connected() {
            return false;
        }
        let envelope = Envelope::new(self.now_ms(), message.into());
        let kind = envelope.kind();

        if let Err(e) = validate_outbound(&envelope) {
            tracing::warn!("Refusing to send invalid message: {e}");
            return false;
        }
        let bytes = match encode_envelope(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to encode {kind:?}: {e}");
                return false;
            }
        };
        match self.connection.send_frame(bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send {kind:?}: {e}");
                false
            }
        }
    }

    /// Ask the server to add us to the running match.
    pub fn join_game(&mut self, display_name: &str, client_version: &str) -> bool {
        self.send(JoinRequest {
            display_name: display_name.to_string(),
            client_version: client_version.to_string(),
        })
    }

    pub fn send_input(&mut self, intent: InputIntent) -> bool {
        self.send(intent)
    }

    pub fn send_ping(&mut self, probe: PingProbe) -> bool {
        self.send(probe)
    }

    pub fn send_chat(&mut self, chat: ChatText) -> bool {
        self.send(chat)
    }

    /// Process everything the socket delivered since the last call.
    pub fn poll(&mut self) {
        let dropped = &mut self.frames_dropped;
        self.connection.poll(|frame| {
            let event = decode_frame(frame);
            if event.is_none() {
                *dropped += 1;
            }
            event
        });
    }

    /// Inbound frames that could not be decoded.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&ClientEvent) + 'static,
    {
        self.connection.events_mut().on(kind, handler)
    }

    /// Register a handler for one inbound payload type.
    pub fn on_message<P, F>(&mut self, handler: F) -> SubscriptionId
    where
        P: Payload,
        F: FnMut(&P) + 'static,
    {
        self.connection.events_mut().on_message::<P, F>(handler)
    }

    pub fn off(&mut self, kind: EventKind, id: SubscriptionId) -> bool {
        self.connection.events_mut().off(kind, id)
    }

    /// Publish `event` to local subscribers as if it had arrived.
    pub fn emit(&mut self, event: &ClientEvent) -> usize {
        self.connection.events_mut().emit(event)
    }

    pub fn events(&self) -> &EventBus {
        self.connection.events()
    }
}

fn decode_frame(frame: InboundFrame) -> Option<ClientEvent> {
    let bytes = match frame {
        InboundFrame::Binary(bytes) => bytes,
        InboundFrame::Text(text) => {
            tracing::warn!("Dropping {} byte text frame", text.len());
            return None;
        }
    };
    match decode_envelope(&bytes) {
        Ok(Envelope {
            message: Some(message),
            ..
        }) => Some(ClientEvent::Message(message)),
        Ok(_) => {
            tracing::debug!("Envelope carried no payload");
            None
        }
        Err(e) => {
            tracing::warn!("Dropping undecodable {} byte frame: {e}", bytes.len());
            None
        }
    }
}
