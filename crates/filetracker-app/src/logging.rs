//! Structured logging init: a JSON formatter driven by `RUST_LOG`
//! (defaulting to `info`), set up once at process start.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_structured_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).json().with_target(true).with_current_span(true).init();
}
