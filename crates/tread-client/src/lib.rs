//! The Tread client: a session that samples tank controls, rate-limits them
//! onto the wire and keeps track of what the server reports back.

pub mod autopilot;
pub mod frame_loop;
pub mod scheduler;
pub mod session;

pub use autopilot::Autopilot;
pub use frame_loop::{FRAME_INTERVAL, FrameLoop};
pub use scheduler::{IntentSink, TransmissionScheduler, intent_from_state};
pub use session::{GameSession, PlayerIdentity, SessionConfig, SessionStats};
