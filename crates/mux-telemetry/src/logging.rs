//! Subscriber setup and exchange logging helpers.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter for `config`, preferring `RUST_LOG` when it parses.
pub(crate) fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Filter {
            filter: config.log_level.clone(),
            reason: e.to_string(),
        })
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed, so call it once at startup.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = build_filter(config)?;

    if !config.console_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    } else if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        filter = %config.log_level,
        json = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

/// Log one channel exchange with the service name and standard fields.
///
/// ```rust,ignore
/// log_exchange!(info, "helpdesk", "ticket fetched", request_id = %id, status = 200);
/// ```
#[macro_export]
macro_rules! log_exchange {
    (info, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(service = $service, $($($field)*,)? $msg)
    };

    (warn, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(service = $service, $($($field)*,)? $msg)
    };

    (error, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(service = $service, $($($field)*,)? $msg)
    };

    (debug, $service:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(service = $service, $($($field)*,)? $msg)
    };
}
