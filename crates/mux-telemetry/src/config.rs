//! Telemetry configuration from environment variables.

use std::env;

const DEFAULT_SERVICE_NAME: &str = "duplex-mux";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name stamped on every exchange log line
    pub service_name: String,

    /// Filter directive (trace, debug, info, or a full `EnvFilter` string)
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to write logs to stdout at all
    pub console_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
            console_output: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `MUX_SERVICE_NAME`: Service name (default: duplex-mux)
    /// - `MUX_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `MUX_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `MUX_CONSOLE_OUTPUT`: Enable console output (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("MUX_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("MUX_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            json_logs: lookup("MUX_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.json_logs),
            console_output: lookup("MUX_CONSOLE_OUTPUT")
                .map(|v| !v.eq_ignore_ascii_case("false") && v != "0")
                .unwrap_or(defaults.console_output),
        }
    }

    /// Configuration for a named service with the given filter.
    pub fn for_service(service_name: &str, log_level: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            log_level: log_level.to_string(),
            ..Self::default()
        }
    }
}
