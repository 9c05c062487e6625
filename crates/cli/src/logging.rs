use std::env;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "MEDIASORT_LOG";

/// Logs go to stderr so table and JSON output on stdout stay clean.
pub fn init_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        env::var(LOG_ENV)
            .ok()
            .and_then(|value| EnvFilter::try_new(value).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
