//! Shared start-up for the `ouros-diff` and `ouros-race` binaries.

use std::io::{self, IsTerminal as _};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _};

/// Environment variable holding the log filter, e.g. `ouros_diff=debug`.
pub const LOG_ENV: &str = "OUROS_DIFF_LOG";

/// Installs a stderr subscriber filtered by [`LOG_ENV`], defaulting to `info`.
pub fn init_tracing() -> Result<(), String> {
    let mut layer = tracing_subscriber::fmt::layer()
        .with_thread_names(true)
        .with_writer(io::stderr);
    if !io::stderr().is_terminal() {
        layer.set_ansi(false);
    }

    tracing::subscriber::set_global_default(
        tracing_subscriber::Registry::default()
            .with(
                EnvFilter::builder()
                    .with_env_var(LOG_ENV)
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with(layer),
    )
    .map_err(|err| format!("failed to configure tracing: {err}"))
}
