//! Shape checks applied to outbound envelopes before they are encoded.

use crate::messages::{Envelope, Message, MessageKind};

/// Longest display name accepted, in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Longest chat line accepted, in bytes.
pub const MAX_CHAT_LEN: usize = 500;

/// Why an outbound envelope was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The envelope has no variant set.
    #[error("envelope carries no payload")]
    MissingPayload,

    /// The kind may only be sent by the server.
    #[error("{0} cannot be sent by a client")]
    WrongDirection(MessageKind),

    /// A float field is NaN or infinite.
    #[error("{kind}.{field} is not finite")]
    NonFinite {
        kind: MessageKind,
        field: &'static str,
    },

    /// A required string is empty.
    #[error("{kind}.{field} is empty")]
    Empty {
        kind: MessageKind,
        field: &'static str,
    },

    /// A string exceeds its limit.
    #[error("{kind}.{field} is {len} bytes, limit is {max}")]
    TooLong {
        kind: MessageKind,
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Check that `envelope` is something a client is allowed to transmit.
pub fn validate_outbound(envelope: &Envelope) -> Result<(), ValidationError> {
    let message = envelope
        .message
        .as_ref()
        .ok_or(ValidationError::MissingPayload)?;
    let kind = message.kind();
    if !kind.client_may_send() {
        return Err(ValidationError::WrongDirection(kind));
    }

    match message {
        Message::InputIntent(intent) => {
            if !intent.turret_angle.is_finite() {
                return Err(ValidationError::NonFinite {
                    kind,
                    field: "turret_angle",
                });
            }
        }
        Message::JoinRequest(req) => {
            non_empty(kind, "display_name", &req.display_name)?;
            non_empty(kind, "client_version", &req.client_version)?;
            bounded(kind, "display_name", &req.display_name, MAX_DISPLAY_NAME_LEN)?;
        }
        Message::ChatText(chat) => {
            non_empty(kind, "message", &chat.message)?;
            bounded(kind, "message", &chat.message, MAX_CHAT_LEN)?;
        }
        Message::PingProbe(_)
        | Message::JoinResponse(_)
        | Message::WorldSnapshot(_)
        | Message::PongEcho(_) => {}
    }
    Ok(())
}

fn non_empty(kind: MessageKind, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty { kind, field })
    } else {
        Ok(())
    }
}

fn bounded(
    kind: MessageKind,
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.len() > max {
        Err(ValidationError::TooLong {
            kind,
            field,
            len: value.len(),
            max,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::*;

    fn wrap(message: Message) -> Envelope {
        Envelope::new(0, message)
    }

    #[test]
    fn test_valid_input_intent_passes() {
        let env = wrap(Message::InputIntent(InputIntent {
            forward: true,
            turret_angle: 1.0,
            ..Default::default()
        }));
        assert_eq!(validate_outbound(&env), Ok(()));
    }

    #[test]
    fn test_nan_turret_angle_rejected() {
        let env = wrap(Message::InputIntent(InputIntent {
            turret_angle: f32::NAN,
            ..Default::default()
        }));
        assert!(matches!(
            validate_outbound(&env),
            Err(ValidationError::NonFinite { field: "turret_angle", .. })
        ));
    }

    #[test]
    fn test_missing_payload_rejected() {
        let env = Envelope {
            timestamp_ms: 0,
            message: None,
        };
        assert_eq!(validate_outbound(&env), Err(ValidationError::MissingPayload));
    }

    #[test]
    fn test_server_kinds_rejected() {
        let env = wrap(Message::PongEcho(PongEcho {
            client_sent_at: 0,
            server_sent_at: 0,
            sequence_number: 0,
        }));
        assert_eq!(
            validate_outbound(&env),
            Err(ValidationError::WrongDirection(MessageKind::PongEcho))
        );
    }

    #[test]
    fn test_join_request_needs_a_name() {
        let env = wrap(Message::JoinRequest(JoinRequest {
            display_name: "   ".into(),
            client_version: "1.0.0".into(),
        }));
        assert!(matches!(
            validate_outbound(&env),
            Err(ValidationError::Empty { field: "display_name", .. })
        ));
    }

    #[test]
    fn test_chat_length_limits() {
        let chat = |message: String| {
            wrap(Message::ChatText(ChatText {
                player_id: "p".into(),
                display_name: "P".into(),
                message,
                sent_at: 0,
            }))
        };
        assert!(validate_outbound(&chat("hi".into())).is_ok());
        assert!(matches!(
            validate_outbound(&chat(String::new())),
            Err(ValidationError::Empty { .. })
        ));
        assert!(matches!(
            validate_outbound(&chat("x".repeat(MAX_CHAT_LEN + 1))),
            Err(ValidationError::TooLong { len: 501, max: 500, .. })
        ));
    }
}
