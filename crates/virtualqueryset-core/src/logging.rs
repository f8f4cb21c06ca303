//! Logging integration.
//!
//! Helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-load spans
//! around data sources.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level`. In debug mode a pretty,
/// human-readable format is used; otherwise structured JSON. Calling this
/// more than once is harmless: later calls leave the first subscriber in place.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one data-source load.
///
/// # Examples
///
/// ```
/// use virtualqueryset_core::logging::source_span;
///
/// let span = source_span("json", "data/products.json");
/// let _guard = span.enter();
/// tracing::debug!("loading");
/// ```
pub fn source_span(kind: &str, name: &str) -> tracing::Span {
    tracing::debug_span!("virtual_source", kind = kind, name = name)
}
