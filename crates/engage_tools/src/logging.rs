#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ENGAGE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Routes `log` records from the library crates into a stderr `fmt`
/// subscriber filtered by `filter` (env-filter syntax).
pub fn init_logging(filter: Option<&str>) -> Result<(), String> {
    tracing_log::LogTracer::init().ok();

    let filter = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER);
    let env_filter =
        EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| format!("failed to initialize logging: {e}"))
}
