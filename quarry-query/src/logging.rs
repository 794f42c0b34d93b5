//! Logging for quarry.
//!
//! Statements are logged through `tracing`; this module only decides whether
//! and how a subscriber is installed, based on environment variables.
//!
//! # Environment Variables
//!
//! - `QUARRY_DEBUG=true` (or `1`, `yes`) - Enable debug logging
//! - `QUARRY_LOG_LEVEL=debug|info|warn|error|trace` - Set a specific log level
//! - `QUARRY_LOG_FORMAT=json|pretty|compact` - Set the output format (default: json)
//!
//! ```rust,no_run
//! use quarry_query::logging;
//!
//! // Call once at startup.
//! logging::init();
//! ```
//!
//! Compiled statements are emitted at `debug` with the SQL text and parameter
//! count; population steps log the relation name and number of keys.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

fn from_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Check if debug logging is enabled via `QUARRY_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    debug_enabled(from_env)
}

/// Get the configured log level from `QUARRY_LOG_LEVEL`.
///
/// Defaults to "debug" if `QUARRY_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    log_level(from_env)
}

/// Get the configured log format from `QUARRY_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    log_format(from_env)
}

fn debug_enabled(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup("QUARRY_DEBUG").is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn log_level(lookup: impl Fn(&str) -> Option<String>) -> &'static str {
    let fallback = if debug_enabled(&lookup) { "debug" } else { "warn" };
    lookup("QUARRY_LOG_LEVEL").map_or(fallback, |level| parse_level(&level).unwrap_or(fallback))
}

fn log_format(lookup: impl Fn(&str) -> Option<String>) -> &'static str {
    match lookup("QUARRY_LOG_FORMAT").map(|f| f.to_lowercase()).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

fn parse_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Initialize logging. Subsequent calls are no-ops.
///
/// Nothing is installed unless `QUARRY_DEBUG` or `QUARRY_LOG_LEVEL` is set, or
/// when the `tracing-subscriber` feature is disabled; callers can always install
/// their own subscriber instead.
pub fn init() {
    if !is_debug_enabled() && from_env("QUARRY_LOG_LEVEL").is_none() {
        return;
    }
    install(get_log_level());
}

/// Initialize logging with a specific level, ignoring `QUARRY_LOG_LEVEL`.
///
/// Unknown levels fall back to the environment's level. Subsequent calls are
/// no-ops.
pub fn init_with_level(level: &str) {
    install(parse_level(level).unwrap_or_else(get_log_level));
}

fn install(level: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "quarry={},quarry_query={},quarry_postgres={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match get_log_format() {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .init(),
            }

            tracing::info!(
                level = level,
                format = get_log_format(),
                "quarry logging initialized"
            );
        }
        #[cfg(not(feature = "tracing-subscriber"))]
        let _ = level;
    });
}

/// Debug-level event emitted only when `QUARRY_DEBUG` is enabled.
#[macro_export]
macro_rules! quarry_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            $crate::__tracing::debug!($($arg)*);
        }
    };
}
