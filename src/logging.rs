use tracing_subscriber::EnvFilter;

/// Filter directives are read from this variable first, then `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "XTRIUM_LOG";

pub const DEFAULT_LEVEL: &str = "warn";

fn env_filter(default_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level.unwrap_or(DEFAULT_LEVEL)))
}

/// Install a stderr tracing subscriber. Returns false when a global
/// subscriber was already set, in which case nothing changes.
pub fn init_tracing(default_level: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
