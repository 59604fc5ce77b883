//! The `tread` binary: a headless client that connects, joins, and streams
//! input at 60 Hz until interrupted.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use tread_client::{Autopilot, FRAME_INTERVAL, FrameLoop, GameSession, SessionStats};
use tread_config::{CliArgs, Config};
use tread_net::{SystemClock, WsConnector, resolve_server_url};

/// Frames to wait for the close handshake on shutdown.
const CLOSE_GRACE_FRAMES: usize = 30;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let (mut config, config_dir) =
        Config::load_from(args.config.as_deref()).context("loading configuration")?;
    config.apply_cli_overrides(&args);

    let json_dir = config.debug.json_log_dir.clone();
    tread_log::init_logging(json_dir.as_deref(), json_dir.is_some(), Some(&config));
    info!("Using config from {}", config_dir.display());

    let url = resolve_server_url(
        config.network.server_url.as_deref(),
        &config.network.page_origin,
        config.network.dev_port,
    )
    .context("resolving server URL")?;
    let connector = WsConnector::current().context("no tokio runtime")?;
    let mut session = GameSession::from_config(&config, Box::new(connector), Arc::new(SystemClock))
        .context("applying key bindings")?;
    let mut autopilot = args.autopilot.then(Autopilot::new);

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut pending = Some(session.connect(&url));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                session.frame();
                if let Some(result) = pending.as_mut().and_then(|p| p.try_result()) {
                    pending = None;
                    if let Err(e) = result {
                        warn!("Initial connection failed: {e}");
                    }
                }
                if session.is_connected() {
                    break;
                }
                if session.is_idle() {
                    bail!("could not connect to {url}");
                }
            }
            _ = &mut shutdown => return Ok(()),
        }
    }

    let mut frames = FrameLoop::default();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = session.now_ms();
                frames.begin_frame(now);
                if let Some(pilot) = autopilot.as_mut() {
                    pilot.step(now, session.sampler_mut());
                }
                session.frame();
                if frames.hud_due(now) {
                    log_hud(&session.stats());
                }
                if session.is_idle() {
                    warn!("Connection lost for good; exiting");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("Interrupted; disconnecting");
                if let Some(pilot) = autopilot.as_mut() {
                    pilot.stop(session.sampler_mut());
                }
                session.disconnect();
                for _ in 0..CLOSE_GRACE_FRAMES {
                    session.frame();
                    if session.is_idle() {
                        break;
                    }
                    ticker.tick().await;
                }
                break;
            }
        }
    }

    info!(
        "Ran {} frames ({} stalls), sent {} inputs",
        frames.frame_count(),
        frames.stall_count(),
        session.stats().inputs_sent
    );
    Ok(())
}

fn log_hud(stats: &SessionStats) {
    let ping = stats
        .latency
        .latest
        .map_or_else(|| "-".to_string(), |rtt| format!("{} ms", rtt.as_millis()));
    let tick = stats
        .last_tick
        .map_or_else(|| "-".to_string(), |t| t.to_string());
    info!(
        target: "tread::hud",
        "{} | player {} | ping {} | snapshots {} (tick {}) | inputs {} (seq {})",
        stats.state,
        stats.player_id.as_deref().unwrap_or("-"),
        ping,
        stats.snapshots_received,
        tick,
        stats.inputs_sent,
        stats.input_sequence
    );
}
