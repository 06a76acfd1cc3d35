//! Logging setup for the Tsukue binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Both the server library crate and the binary log at `default_log_level`.
/// `tower_http` request traces are enabled at the same level so that upgrade
/// requests show up next to room events. `RUST_LOG` overrides everything.
///
/// # Examples
///
/// ```no_run
/// use tsukue_shared::logger::setup_logger;
///
/// setup_logger("tsukue_server", "debug");
/// ```
pub fn setup_logger(crate_name: &str, default_log_level: &str) {
    let crate_name = crate_name.replace('-', "_");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}={},tower_http={}",
                    crate_name, default_log_level, default_log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
