// Tracing initialization with a configurable and reloadable filter.
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Install the global subscriber using the configured level.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
    init_tracing_with_level(&logging.level)
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing_with_level(level: &str) -> bool {
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let installed = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        let _ = LOG_RELOAD_HANDLE.set(handle);
    }
    installed
}

/// Apply a new logging level at runtime if the reload handle is configured.
///
/// Returns `false` when tracing was not initialised through this module.
pub fn apply_logging_level(level: &str) -> bool {
    match LOG_RELOAD_HANDLE.get() {
        Some(handle) => handle.modify(|f| *f = EnvFilter::new(level)).is_ok(),
        None => false,
    }
}
