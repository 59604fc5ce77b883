//! Per-frame send gate between the input sampler and the dispatcher.
//!
//! Each frame [`TransmissionScheduler::step`] looks at the sampler's state.
//! A pending change is sent when at least `min_interval_ms` has passed since
//! the last successful send. Otherwise it stays pending and is folded into
//! the next eligible send, so a burst of changes becomes at most one message
//! per interval carrying the latest state.

use tread_input::{InputSampler, InputState};
use tread_net::{InputIntent, MessageDispatcher};

/// Default spacing between input messages (20 per second).
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 50;

/// Where intents go. Implemented by [`MessageDispatcher`].
pub trait IntentSink {
    /// Transmit `intent`. Returns whether it was sent.
    fn send_intent(&mut self, intent: InputIntent) -> bool;
}

impl IntentSink for MessageDispatcher {
    fn send_intent(&mut self, intent: InputIntent) -> bool {
        self.send_input(intent)
    }
}

/// Wire payload for a sampler state. Change flag and sequence number stay
/// local.
pub fn intent_from_state(state: &InputState) -> InputIntent {
    InputIntent {
        forward: state.forward,
        backward: state.backward,
        rotate_left: state.rotate_left,
        rotate_right: state.rotate_right,
        fire: state.fire,
        turret_angle: state.turret_angle,
    }
}

/// Rate-limited input transmission.
#[derive(Debug, Clone)]
pub struct TransmissionScheduler {
    min_interval_ms: u64,
    last_sent_at: Option<u64>,
    sent: u64,
}

impl Default for TransmissionScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL_MS)
    }
}

impl TransmissionScheduler {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_sent_at: None,
            sent: 0,
        }
    }

    /// Run the gate once. Returns `true` if an intent was sent, in which case
    /// the sampler's change flag has been cleared.
    pub fn step(
        &mut self,
        now_ms: u64,
        sampler: &mut InputSampler,
        sink: &mut impl IntentSink,
    ) -> bool {
        let state = sampler.state();
        if !state.has_changes {
            return false;
        }
        if let Some(last) = self.last_sent_at
            && now_ms.saturating_sub(last) < self.min_interval_ms
        {
            return false;
        }
        if !sink.send_intent(intent_from_state(&state)) {
            return false;
        }
        self.last_sent_at = Some(now_ms);
        self.sent += 1;
        sampler.reset_changes();
        tracing::trace!("Sent input #{}", state.sequence_number);
        true
    }

    /// Intents sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn last_sent_at(&self) -> Option<u64> {
        self.last_sent_at
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }
}
