//! Structured logging setup for the replay binary.
//!
//! Logs go to stderr so stdout stays a clean JSONL stream of screens.
//! `CALLSTREAM_LOG` takes an env-filter directive (default `warn`);
//! `CALLSTREAM_LOG_JSON=1` or `--log-json` switches to JSON lines.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CALLSTREAM_LOG";
pub const LOG_JSON_ENV: &str = "CALLSTREAM_LOG_JSON";

/// Whether JSON log output was requested through the environment.
#[must_use]
pub fn json_from_env() -> bool {
    std::env::var(LOG_JSON_ENV)
        .map(|val| val == "1" || val.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Install the global subscriber. A second call is ignored.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!(message = "logging.already_initialized");
    }
}
