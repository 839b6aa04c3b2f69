//! Channel configuration with validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default transport event name.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// What a subscription cancel removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelScope {
    /// Only the subscriber that was cancelled.
    #[default]
    Subscriber,
    /// Every subscriber registered on the same action.
    Action,
}

impl FromStr for CancelScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "subscriber" => Ok(CancelScope::Subscriber),
            "action" => Ok(CancelScope::Action),
            other => Err(ConfigError::InvalidCancelScope(other.to_string())),
        }
    }
}

impl fmt::Display for CancelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelScope::Subscriber => f.write_str("subscriber"),
            CancelScope::Action => f.write_str("action"),
        }
    }
}

/// Configuration for one [`Channel`](crate::Channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Transport-level event name all envelopes travel on
    pub event_name: String,
    /// Subscription cancel scope
    pub cancel_scope: CancelScope,
    /// Timeout applied to every request (none: wait until answered or cancelled)
    pub request_timeout_ms: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_name: DEFAULT_EVENT_NAME.to_string(),
            cancel_scope: CancelScope::default(),
            request_timeout_ms: None,
        }
    }
}

impl ChannelConfig {
    /// Default configuration bound to `event_name`.
    pub fn for_event(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MUX_EVENT_NAME`: transport event name (default: message)
    /// - `MUX_CANCEL_SCOPE`: `subscriber` or `action` (default: subscriber)
    /// - `MUX_REQUEST_TIMEOUT_MS`: request timeout in ms (default: none)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            event_name: lookup("MUX_EVENT_NAME").unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            cancel_scope: lookup("MUX_CANCEL_SCOPE")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            request_timeout_ms: lookup("MUX_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()),
        }
    }

    pub fn with_cancel_scope(mut self, scope: CancelScope) -> Self {
        self.cancel_scope = scope;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_name.trim().is_empty() {
            return Err(ConfigError::EmptyEventName);
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "request timeout cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("event name cannot be empty")]
    EmptyEventName,
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid cancel scope `{0}` (expected `subscriber` or `action`)")]
    InvalidCancelScope(String),
}
