//! Round-trip latency measurement: RTT, jitter and a rolling window.
//!
//! Probes carry the client's send time, which the server echoes back
//! unchanged, so no table of in-flight probes is kept. A probe that is never
//! echoed simply produces no sample.

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;

use crate::clock::SharedClock;
use crate::dispatcher::MessageDispatcher;
use crate::messages::{PingProbe, PongEcho};

/// Configuration for the latency tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyConfig {
    /// Number of RTT samples to keep in the rolling window. Default: 100.
    pub window_size: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self { window_size: 100 }
    }
}

/// Rolling window of RTT samples.
pub struct LatencyTracker {
    config: LatencyConfig,
    /// Stamps outgoing probes and times echoes on arrival.
    clock: SharedClock,
    /// Oldest first, at most `config.window_size` entries.
    pub(crate) rtt_samples: VecDeque<Duration>,
    /// Most recent sample, recorded even with a zero-size window.
    latest: Option<Duration>,
    /// Probes the dispatcher accepted.
    probes_sent: u64,
    echoes_received: u64,
}

impl LatencyTracker {
    pub fn new(config: LatencyConfig, clock: SharedClock) -> Self {
        Self {
            rtt_samples: VecDeque::with_capacity(config.window_size),
            config,
            clock,
            latest: None,
            probes_sent: 0,
            echoes_received: 0,
        }
    }

    /// Build a probe stamped with the current time and a random sequence
    /// number.
    pub fn build_probe(&self) -> PingProbe {
        PingProbe {
            client_sent_at: self.clock.now_ms(),
            sequence_number: rand::rng().random_range(0..1_000_000),
        }
    }

    /// Build and transmit a probe. Returns whether it was sent.
    pub fn send_probe(&mut self, dispatcher: &mut MessageDispatcher) -> bool {
        let probe = self.build_probe();
        let sent = dispatcher.send_ping(probe);
        if sent {
            self.probes_sent += 1;
            tracing::trace!("Sent latency probe #{}", probe.sequence_number);
        }
        sent
    }

    /// Record an echo. Returns the measured RTT.
    pub fn on_pong(&mut self, echo: &PongEcho) -> Duration {
        let now = self.clock.now_ms();
        let rtt = Duration::from_millis(now.saturating_sub(echo.client_sent_at));

        if self.rtt_samples.len() >= self.config.window_size {
            self.rtt_samples.pop_front();
        }
        if self.config.window_size > 0 {
            self.rtt_samples.push_back(rtt);
        }
        self.latest = Some(rtt);
        self.echoes_received += 1;
        tracing::debug!("Latency: {}ms", rtt.as_millis());
        rtt
    }

    /// Most recent RTT.
    pub fn latest(&self) -> Option<Duration> {
        self.latest
    }

    /// Average RTT over the rolling window.
    pub fn average(&self) -> Option<Duration> {
        if self.rtt_samples.is_empty() {
            return None;
        }
        let sum: Duration = self.rtt_samples.iter().sum();
        Some(sum / self.rtt_samples.len() as u32)
    }

    pub fn min(&self) -> Option<Duration> {
        self.rtt_samples.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.rtt_samples.iter().max().copied()
    }

    /// Jitter: sample standard deviation of the window.
    pub fn jitter(&self) -> Option<Duration> {
        if self.rtt_samples.len() < 2 {
            return None;
        }

        let avg = self.average()?.as_secs_f64();
        let variance: f64 = self
            .rtt_samples
            .iter()
            .map(|s| {
                let diff = s.as_secs_f64() - avg;
                diff * diff
            })
            .sum::<f64>()
            / (self.rtt_samples.len() - 1) as f64;

        Some(Duration::from_secs_f64(variance.sqrt()))
    }

    pub fn probes_sent(&self) -> u64 {
        self.probes_sent
    }

    pub fn echoes_received(&self) -> u64 {
        self.echoes_received
    }

    pub fn sample_count(&self) -> usize {
        self.rtt_samples.len()
    }

    /// Immutable copy of the current figures.
    pub fn snapshot(&self) -> LatencyStats {
        LatencyStats {
            latest: self.latest(),
            average: self.average(),
            min: self.min(),
            max: self.max(),
            jitter: self.jitter(),
            probes_sent: self.probes_sent,
            echoes_received: self.echoes_received,
            sample_count: self.sample_count(),
        }
    }
}

/// Latency figures for the HUD and debug tooling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyStats {
    pub latest: Option<Duration>,
    pub average: Option<Duration>,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    pub jitter: Option<Duration>,
    pub probes_sent: u64,
    pub echoes_received: u64,
    pub sample_count: usize,
}
