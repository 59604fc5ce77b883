//! Structured logging for the Tread client.
//!
//! Console output with module paths and uptime timestamps, plus optional JSON
//! file logging for post-mortem analysis of network sessions. The level comes
//! from `RUST_LOG` when set, otherwise from the config's `debug.log_level`.
//! Records emitted through the `log` crate are bridged into `tracing`.

use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tread_config::Config;

/// Directives appended to a bare level so socket internals stay quiet.
const QUIET_DEPENDENCIES: &str = "tungstenite=warn,tokio_tungstenite=warn";

/// File written inside the log directory when JSON logging is on.
pub const LOG_FILE: &str = "tread.log";

/// Build the filter string for a configured level.
///
/// A bare level such as `"debug"` gets the dependency directives appended;
/// anything containing its own directives is used verbatim.
pub fn filter_for_level(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        format!("info,{QUIET_DEPENDENCIES}")
    } else if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("{level},{QUIET_DEPENDENCIES}")
    }
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - Directory for the JSON log file
/// * `json_file` - Whether to write the JSON log file at all
/// * `config` - Source of the log level when `RUST_LOG` is unset
///
/// Returns `false` if a global subscriber was already installed.
///
/// ```no_run
/// use tread_log::init_logging;
/// use tread_config::Config;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, json_file: bool, config: Option<&Config>) -> bool {
    let filter_str = config
        .map(|c| filter_for_level(&c.debug.log_level))
        .unwrap_or_else(|| filter_for_level(""));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(false)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if json_file
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        return subscriber.with(file_layer).try_init().is_ok();
    }

    subscriber.try_init().is_ok()
}

/// `EnvFilter` with the default directives: `info` overall, `warn` for the
/// WebSocket stack.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(filter_for_level(""))
}
