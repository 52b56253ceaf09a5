use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize structured logging with tracing-subscriber.
///
/// Uses the `RUST_LOG` env var if set, otherwise builds a filter from the
/// `logging` config section (crate at `level`, libraries at `lib_level`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let lib_level = config.lib_level.as_deref().unwrap_or("warn");
    let directive = format!("{lib_level},inflow={level}", level = config.level);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
