//! Frame bookkeeping for the client's 60 Hz loop.
//!
//! The loop itself is driven by a timer; [`FrameLoop`] measures the time
//! between frames against the session clock, flags stalls, and decides when
//! the once-a-second HUD line is due.

use std::time::Duration;

use tracing::warn;

/// Target frame spacing: 60 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// A gap longer than this between frames is logged as a stall.
pub const STALL_THRESHOLD_MS: u64 = 250;

/// Default HUD cadence.
pub const HUD_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct FrameLoop {
    previous_ms: Option<u64>,
    frame_count: u64,
    stall_count: u64,
    hud_interval_ms: u64,
    last_hud_ms: Option<u64>,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new(HUD_INTERVAL_MS)
    }
}

impl FrameLoop {
    pub fn new(hud_interval_ms: u64) -> Self {
        Self {
            previous_ms: None,
            frame_count: 0,
            stall_count: 0,
            hud_interval_ms,
            last_hud_ms: None,
        }
    }

    /// Start a frame at `now_ms`. Returns milliseconds since the previous
    /// frame (zero for the first).
    pub fn begin_frame(&mut self, now_ms: u64) -> u64 {
        let elapsed = self
            .previous_ms
            .map_or(0, |previous| now_ms.saturating_sub(previous));
        self.previous_ms = Some(now_ms);
        self.frame_count += 1;

        if elapsed > STALL_THRESHOLD_MS {
            self.stall_count += 1;
            warn!("Frame stalled for {elapsed} ms");
        }
        elapsed
    }

    /// Whether the HUD line should be printed at `now_ms`. The first call
    /// only arms the timer.
    pub fn hud_due(&mut self, now_ms: u64) -> bool {
        match self.last_hud_ms {
            None => {
                self.last_hud_ms = Some(now_ms);
                false
            }
            Some(last) if now_ms.saturating_sub(last) >= self.hud_interval_ms => {
                self.last_hud_ms = Some(now_ms);
                true
            }
            Some(_) => false,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames that started more than [`STALL_THRESHOLD_MS`] after the one
    /// before.
    pub fn stall_count(&self) -> u64 {
        self.stall_count
    }
}
