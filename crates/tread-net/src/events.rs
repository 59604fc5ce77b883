//! Consumer-facing events and the registration table that delivers them.
//!
//! [`EventBus`] maps an [`EventKind`] to an ordered list of handlers. The set
//! of kinds is closed: connection lifecycle events plus one kind per
//! [`MessageKind`]. Handlers run in registration order; a handler that panics
//! is logged and skipped, and the remaining handlers still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::messages::{Message, MessageKind, Payload};

/// Close code and reason reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// Everything the sync layer publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The socket opened.
    Connected,
    /// The socket closed.
    Disconnected(CloseInfo),
    /// The transport reported an error.
    Error { detail: String },
    /// A decoded inbound message.
    Message(Message),
}

impl ClientEvent {
    /// Registration key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Connected => EventKind::Connected,
            ClientEvent::Disconnected(_) => EventKind::Disconnected,
            ClientEvent::Error { .. } => EventKind::Error,
            ClientEvent::Message(msg) => EventKind::Message(msg.kind()),
        }
    }
}

/// Registration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    Message(MessageKind),
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Connected => f.write_str("connected"),
            EventKind::Disconnected => f.write_str("disconnected"),
            EventKind::Error => f.write_str("error"),
            EventKind::Message(kind) => f.write_str(kind.name()),
        }
    }
}

/// Token returned by [`EventBus::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&ClientEvent)>;

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

/// Ordered handler table keyed by [`EventKind`].
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Subscription>>,
    next_id: u64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. Handlers for the same kind run in the
    /// order they were registered.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&ClientEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(kind).or_default().push(Subscription {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Register a handler typed against one payload struct.
    pub fn on_message<P, F>(&mut self, mut handler: F) -> SubscriptionId
    where
        P: Payload,
        F: FnMut(&P) + 'static,
    {
        self.on(EventKind::Message(P::KIND), move |event| {
            if let ClientEvent::Message(msg) = event
                && let Some(payload) = P::from_message(msg)
            {
                handler(payload);
            }
        })
    }

    /// Remove a handler. Returns `false` if it was not registered for `kind`.
    pub fn off(&mut self, kind: EventKind, id: SubscriptionId) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|sub| sub.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&kind);
        }
        removed
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Returns how many handlers completed without panicking.
    pub fn emit(&mut self, event: &ClientEvent) -> usize {
        let kind = event.kind();
        let Some(list) = self.handlers.get_mut(&kind) else {
            tracing::trace!("No handlers for {kind}");
            return 0;
        };

        let mut completed = 0;
        for sub in list.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| (sub.handler)(event))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    tracing::error!(
                        "Handler {:?} for {kind} panicked: {}",
                        sub.id,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        completed
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
