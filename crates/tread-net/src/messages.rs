//! Wire envelope, message variants and the binary codec.
//!
//! Every frame on the socket carries one [`Envelope`]: a millisecond timestamp
//! and at most one [`Message`]. The enum discriminant is the tag of the
//! tagged union, so "exactly one variant set" holds by construction.
//!
//! Frames are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`encode_envelope`] and [`decode_envelope`].

use serde::{Deserialize, Serialize};

use crate::world::{
    GameConfig, GameEvent, PlayerScore, PowerUpState, ProjectileState, TankState,
};

/// Current wire-protocol version. Prepended to every encoded envelope.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One frame's worth of data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Sender wall clock, Unix milliseconds.
    pub timestamp_ms: u64,
    /// The populated variant, if any.
    pub message: Option<Message>,
}

impl Envelope {
    /// Wrap `message` stamped with `timestamp_ms`.
    pub fn new(timestamp_ms: u64, message: Message) -> Self {
        Self {
            timestamp_ms,
            message: Some(message),
        }
    }

    /// Discriminant of the carried message.
    pub fn kind(&self) -> Option<MessageKind> {
        self.message.as_ref().map(Message::kind)
    }
}

// ---------------------------------------------------------------------------
// Message + kind
// ---------------------------------------------------------------------------

/// Every message the protocol knows about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    // --- client -> server ---
    /// Ask to join the running match.
    JoinRequest(JoinRequest),
    /// Latest control state.
    InputIntent(InputIntent),
    /// Latency probe.
    PingProbe(PingProbe),

    // --- both directions ---
    /// Chat line.
    ChatText(ChatText),

    // --- server -> client ---
    /// Result of a join request.
    JoinResponse(JoinResponse),
    /// Authoritative world state.
    WorldSnapshot(WorldSnapshot),
    /// Echo of a [`PingProbe`].
    PongEcho(PongEcho),
}

impl Message {
    /// The discriminant of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::JoinRequest(_) => MessageKind::JoinRequest,
            Message::InputIntent(_) => MessageKind::InputIntent,
            Message::PingProbe(_) => MessageKind::PingProbe,
            Message::ChatText(_) => MessageKind::ChatText,
            Message::JoinResponse(_) => MessageKind::JoinResponse,
            Message::WorldSnapshot(_) => MessageKind::WorldSnapshot,
            Message::PongEcho(_) => MessageKind::PongEcho,
        }
    }
}

/// Fieldless discriminant of [`Message`], used as a registration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    JoinRequest,
    InputIntent,
    PingProbe,
    ChatText,
    JoinResponse,
    WorldSnapshot,
    PongEcho,
}

/// Which side of the connection may originate a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    Both,
}

impl MessageKind {
    /// All kinds, in declaration order.
    pub const ALL: [MessageKind; 7] = [
        MessageKind::JoinRequest,
        MessageKind::InputIntent,
        MessageKind::PingProbe,
        MessageKind::ChatText,
        MessageKind::JoinResponse,
        MessageKind::WorldSnapshot,
        MessageKind::PongEcho,
    ];

    /// Stable name of the discriminant.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::JoinRequest => "JoinRequest",
            MessageKind::InputIntent => "InputIntent",
            MessageKind::PingProbe => "PingProbe",
            MessageKind::ChatText => "ChatText",
            MessageKind::JoinResponse => "JoinResponse",
            MessageKind::WorldSnapshot => "WorldSnapshot",
            MessageKind::PongEcho => "PongEcho",
        }
    }

    /// Who is allowed to send this kind.
    pub fn direction(self) -> Direction {
        match self {
            MessageKind::JoinRequest | MessageKind::InputIntent | MessageKind::PingProbe => {
                Direction::ClientToServer
            }
            MessageKind::ChatText => Direction::Both,
            MessageKind::JoinResponse | MessageKind::WorldSnapshot | MessageKind::PongEcho => {
                Direction::ServerToClient
            }
        }
    }

    /// Whether a client may put this kind on the wire.
    pub fn client_may_send(self) -> bool {
        self.direction() != Direction::ServerToClient
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Join request sent right after the socket opens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinRequest {
    pub display_name: String,
    pub client_version: String,
}

/// Control intent. Sequence numbers and change flags stay on the client.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct InputIntent {
    pub forward: bool,
    pub backward: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub fire: bool,
    /// Radians, `atan2` convention.
    pub turret_angle: f32,
}

/// Latency probe. The server echoes `client_sent_at` verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PingProbe {
    /// Client wall clock at send, Unix milliseconds.
    pub client_sent_at: u64,
    /// Random per probe and echoed back unchanged.
    pub sequence_number: u32,
}

/// Chat line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatText {
    /// Empty until the server has assigned us an identity.
    pub player_id: String,
    pub display_name: String,
    /// Must be non-empty.
    pub message: String,
    /// Unix milliseconds.
    pub sent_at: u64,
}

/// Server's answer to a [`JoinRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinResponse {
    pub success: bool,
    /// Why the join was refused. Empty on success.
    pub error_message: String,
    /// Server-assigned player id, meaningful only on success.
    pub player_id: String,
    /// Entity id of the tank we control.
    pub assigned_entity_id: u32,
    /// Arena rules, when the server chooses to send them.
    pub config: Option<GameConfig>,
}

/// One tick of authoritative world state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorldSnapshot {
    /// Server simulation tick this snapshot describes.
    pub tick: u64,
    pub tanks: Vec<TankState>,
    pub projectiles: Vec<ProjectileState>,
    pub power_ups: Vec<PowerUpState>,
    pub events: Vec<GameEvent>,
    pub scores: Vec<PlayerScore>,
    /// Seconds.
    pub round_time_remaining: f32,
    /// Only changed entities are listed; the rest carry over from the last
    /// full snapshot.
    pub is_delta_update: bool,
    /// Tick of the full snapshot a delta applies to.
    pub full_state_tick: u32,
}

/// Echo of a [`PingProbe`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PongEcho {
    /// Copied from the probe; RTT is measured against it.
    pub client_sent_at: u64,
    /// Server wall clock when it answered, Unix milliseconds.
    pub server_sent_at: u64,
    pub sequence_number: u32,
}

// ---------------------------------------------------------------------------
// Typed access
// ---------------------------------------------------------------------------

/// Implemented by every payload struct so handlers and senders can be typed
/// against the concrete payload instead of the whole [`Message`].
pub trait Payload: Sized + 'static {
    /// The discriminant this payload travels under.
    const KIND: MessageKind;

    /// Borrow the payload out of a message of the matching kind.
    fn from_message(message: &Message) -> Option<&Self>;

    /// Wrap the payload in its [`Message`] variant.
    fn into_message(self) -> Message;
}

macro_rules! impl_payload {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Payload for $ty {
                const KIND: MessageKind = MessageKind::$ty;

                fn from_message(message: &Message) -> Option<&Self> {
                    match message {
                        Message::$ty(payload) => Some(payload),
                        _ => None,
                    }
                }

                fn into_message(self) -> Message {
                    Message::$ty(self)
                }
            }

            impl From<$ty> for Message {
                fn from(payload: $ty) -> Self {
                    Message::$ty(payload)
                }
            }
        )*
    };
}

impl_payload!(
    JoinRequest,
    InputIntent,
    PingProbe,
    ChatText,
    JoinResponse,
    WorldSnapshot,
    PongEcho,
);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by the codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The buffer was empty (no version byte).
    #[error("empty frame: no version byte")]
    EmptyFrame,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard failed to encode or decode the body.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encode an [`Envelope`] into a versioned binary frame.
///
/// Wire format: `[version: u8] [postcard-encoded Envelope]`
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let body = postcard::to_allocvec(envelope)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a versioned binary frame into an [`Envelope`].
pub fn decode_envelope(data: &[u8]) -> Result<Envelope, CodecError> {
    let (&version, body) = data.split_first().ok_or(CodecError::EmptyFrame)?;
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::*;

    fn sample_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            tick: 4_242,
            tanks: vec![TankState {
                entity_id: 7,
                player_id: "p-1".into(),
                display_name: "Alice".into(),
                position: Vector3 {
                    x: 10.0,
                    y: 0.0,
                    z: -3.5,
                },
                body_rotation: 1.25,
                turret_rotation: -0.5,
                health: 80,
                max_health: 100,
                team: TeamColor::Red,
                active_powerups: vec![ActivePowerUp {
                    power_up_type: PowerUpType::Shield,
                    duration_remaining: 2.5,
                    total_duration: 5.0,
                }],
                is_invulnerable: false,
                invulnerability_remaining: 0.0,
            }],
            projectiles: vec![ProjectileState {
                entity_id: 99,
                owner_id: "p-1".into(),
                position: Vector3::default(),
                velocity: Vector3 {
                    x: 0.0,
                    y: 0.0,
                    z: 40.0,
                },
                damage: 25,
                team: TeamColor::Red,
                lifetime_remaining: 1.5,
            }],
            power_ups: vec![PowerUpState {
                entity_id: 3,
                power_up_type: PowerUpType::RapidFire,
                position: Vector3::default(),
                is_available: true,
                respawn_timer: 0.0,
            }],
            events: vec![GameEvent {
                timestamp_ms: 1_700_000_000_000,
                kind: GameEventKind::RoundEnded {
                    round_number: 2,
                    final_scores: vec![PlayerScore {
                        player_id: "p-1".into(),
                        display_name: "Alice".into(),
                        kills: 3,
                        deaths: 1,
                        score: 300,
                    }],
                    winner_player_id: "p-1".into(),
                },
            }],
            scores: vec![],
            round_time_remaining: 93.5,
            is_delta_update: false,
            full_state_tick: 4_242,
        }
    }

    fn one_of_each() -> Vec<Message> {
        vec![
            Message::JoinRequest(JoinRequest {
                display_name: "WebClient".into(),
                client_version: "1.0.0".into(),
            }),
            Message::InputIntent(InputIntent {
                forward: true,
                fire: true,
                turret_angle: -2.75,
                ..Default::default()
            }),
            Message::PingProbe(PingProbe {
                client_sent_at: 1_700_000_000_123,
                sequence_number: 987_654,
            }),
            Message::ChatText(ChatText {
                player_id: "web-client".into(),
                display_name: "WebClient".into(),
                message: "gg".into(),
                sent_at: 1_700_000_000_456,
            }),
            Message::JoinResponse(JoinResponse {
                success: true,
                error_message: String::new(),
                player_id: "p-1".into(),
                assigned_entity_id: 7,
                config: Some(GameConfig {
                    tick_rate: 30,
                    max_players: 16,
                    round_duration: 300.0,
                    respawn_time: 3.0,
                    invulnerability_time: 2.0,
                    map_size: Vector2 { x: 200.0, y: 200.0 },
                }),
            }),
            Message::WorldSnapshot(sample_snapshot()),
            Message::PongEcho(PongEcho {
                client_sent_at: 1_700_000_000_123,
                server_sent_at: 1_700_000_000_140,
                sequence_number: 987_654,
            }),
        ]
    }

    #[test]
    fn test_every_kind_survives_roundtrip() {
        let messages = one_of_each();
        let kinds: Vec<_> = messages.iter().map(Message::kind).collect();
        assert_eq!(kinds, MessageKind::ALL.to_vec(), "one sample per kind");

        for msg in messages {
            let envelope = Envelope::new(1_700_000_000_000, msg);
            let bytes = encode_envelope(&envelope).unwrap();
            let decoded = decode_envelope(&bytes).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_envelope_without_payload_roundtrips() {
        let envelope = Envelope {
            timestamp_ms: 5,
            message: None,
        };
        let decoded = decode_envelope(&encode_envelope(&envelope).unwrap()).unwrap();
        assert_eq!(decoded.kind(), None);
        assert_eq!(decoded.timestamp_ms, 5);
    }

    #[test]
    fn test_version_byte_is_first_byte() {
        let envelope = Envelope::new(0, Message::PingProbe(PingProbe {
            client_sent_at: 0,
            sequence_number: 0,
        }));
        let bytes = encode_envelope(&envelope).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let envelope = Envelope::new(0, Message::PingProbe(PingProbe {
            client_sent_at: 0,
            sequence_number: 0,
        }));
        let mut bytes = encode_envelope(&envelope).unwrap();
        bytes[0] = 255;
        assert!(matches!(
            decode_envelope(&bytes),
            Err(CodecError::UnsupportedVersion(255))
        ));
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(matches!(decode_envelope(&[]), Err(CodecError::EmptyFrame)));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let envelope = Envelope::new(1_700_000_000_000, Message::WorldSnapshot(sample_snapshot()));
        let bytes = encode_envelope(&envelope).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            decode_envelope(truncated),
            Err(CodecError::Postcard(_))
        ));
    }

    #[test]
    fn test_payload_trait_extracts_matching_variant_only() {
        let msg: Message = PongEcho {
            client_sent_at: 1,
            server_sent_at: 2,
            sequence_number: 3,
        }
        .into();
        assert_eq!(PongEcho::KIND, MessageKind::PongEcho);
        assert_eq!(PongEcho::from_message(&msg).map(|p| p.server_sent_at), Some(2));
        assert!(PingProbe::from_message(&msg).is_none());
    }

    #[test]
    fn test_directions() {
        assert!(MessageKind::InputIntent.client_may_send());
        assert!(MessageKind::ChatText.client_may_send());
        assert!(!MessageKind::WorldSnapshot.client_may_send());
        assert_eq!(MessageKind::PongEcho.direction(), Direction::ServerToClient);
        assert_eq!(MessageKind::WorldSnapshot.to_string(), "WorldSnapshot");
    }
}
