//! Logging for the docrag binary and libraries.
//!
//! Logs go to stderr so stdout stays clean for search results. A bare level
//! such as `debug` only applies to the docrag crates; dependencies (HTTP
//! client, ANN graph) stay at `warn` unless a full directive list is given.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Crate targets a bare level is applied to.
const DOCRAG_TARGETS: &[&str] = &["docrag", "docrag_core", "docrag_knowledge"];

/// Level for everything outside [`DOCRAG_TARGETS`].
const DEPENDENCY_LEVEL: &str = "warn";

const DEFAULT_LEVEL: &str = "info";

/// Initialize the tracing subscriber with stderr output.
///
/// `log_level` is either a bare level scoped to the docrag crates or a
/// full `EnvFilter` directive list used as is. Without it, `RUST_LOG` is
/// used as is, and without that the docrag crates log at `info`.
///
/// # Example
/// ```no_run
/// use docrag_core::logging::init_logging;
///
/// init_logging(Some("debug"), false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env_filter = build_filter(log_level.or(rust_log.as_deref()))?;

    let fmt_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(!no_color && std::env::var_os("NO_COLOR").is_none());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))
}

/// Turn a level or directive list into a filter.
pub(crate) fn build_filter(spec: Option<&str>) -> AppResult<EnvFilter> {
    let spec = spec.map(str::trim).filter(|s| !s.is_empty());
    let directives = match spec {
        Some(s) if s.contains('=') || s.contains(',') => s.to_string(),
        Some(level) => scoped_directives(level),
        None => scoped_directives(DEFAULT_LEVEL),
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

fn scoped_directives(level: &str) -> String {
    let mut directives = vec![DEPENDENCY_LEVEL.to_string()];
    directives.extend(DOCRAG_TARGETS.iter().map(|t| format!("{}={}", t, level)));
    directives.join(",")
}
