//! # Mux Telemetry
//!
//! Structured logging for services built on `duplex-mux`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mux_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> Result<(), mux_telemetry::TelemetryError> {
//!     let config = TelemetryConfig::from_env();
//!     init_logging(&config)?;
//!     // Channel logs now flow through the configured subscriber
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MUX_SERVICE_NAME` | `duplex-mux` | Service name stamped on log lines |
//! | `MUX_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `MUX_JSON_LOGS` | `false` | JSON formatted output |
//! | `MUX_CONSOLE_OUTPUT` | `true` | Write logs to stdout at all |

#![warn(clippy::all)]
#![deny(unsafe_code)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter `{filter}`: {reason}")]
    Filter { filter: String, reason: String },

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Init(String),
}
