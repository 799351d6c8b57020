//! Tracing subscriber setup. Logs go to stderr so command output stays clean.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Filter used when neither `RUST_LOG` nor `--verbose` is given.
const DEFAULT_FILTER: &str = "warn,matchcity=info";

/// Pick the log filter. `--verbose` wins over `RUST_LOG`.
pub fn filter_directives(verbose: u8, rust_log: Option<&str>) -> String {
    match (verbose, rust_log) {
        (0, Some(value)) if !value.trim().is_empty() => value.to_string(),
        (0, _) => DEFAULT_FILTER.to_string(),
        (1, _) => "warn,matchcity=debug".to_string(),
        _ => "info,matchcity=trace".to_string(),
    }
}

pub fn init_logging(verbose: u8, format: LogFormat) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(filter_directives(verbose, rust_log.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
