//! Structured logging setup (`spec.md` §6, "log level and format").

use tracing_subscriber::EnvFilter;

pub fn init(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
