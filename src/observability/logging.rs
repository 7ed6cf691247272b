//! Structured logging.
//!
//! Priority for determining the log filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `RELOAD_LOG` or `RUST_LOG` environment variable
//! 3. default to `reload=info`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "reload=info,tower_http=warn";

/// Initialise the global subscriber. Call once, from `main`.
pub fn init_logging(cli_level: Option<&str>) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(format!("reload={},tower_http=warn", level)),
        None => EnvFilter::try_from_env("RELOAD_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| DEFAULT_FILTER.into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Root span every orchestrator task runs inside; `prefix` tags each line.
pub fn root_span(prefix: &str) -> tracing::Span {
    tracing::info_span!("reload", name = %prefix)
}
