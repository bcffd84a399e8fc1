//! Tracing setup for the template service.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the configured level applies, with
/// sqlx statement logging capped at warn so resolution traffic does not
/// drown the log. `format = "json"` selects machine-readable output for
/// log shipping; anything else gets a compact human-readable form.
pub fn init_logging(config: &LoggingConfig) {
    let default_directives = format!("{},sqlx=warn", config.level);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .init();
    } else {
        registry.with(fmt::layer().compact().with_target(true)).init();
    }
}
