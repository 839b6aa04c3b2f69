//! Channel error types.
//!
//! Dangling responses and orphan pushes are not errors; the dispatcher drops
//! them and reports a [`DropReason`](crate::dispatcher::DropReason) instead.

use crate::domain::config::ConfigError;
use crate::domain::correlation::RequestId;
use crate::domain::envelope::ResponseEnvelope;
use crate::domain::verb::Verb;
use crate::ports::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Result alias for channel operations.
pub type MuxResult<T> = Result<T, MuxError>;

/// Errors surfaced by channel operations.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The peer answered with a status outside [200, 300).
    #[error("request {} to {} rejected with status {}", .0.request_id, .0.action, .0.status)]
    Rejected(Box<ResponseEnvelope>),

    #[error("response payload for request {request_id} could not be decoded: {source}")]
    Decode {
        request_id: RequestId,
        #[source]
        source: serde_json::Error,
    },

    /// Listener shape does not match the verb kind.
    #[error("invalid listener shape for verb {method}")]
    InvalidListener { method: Verb },

    #[error("`{field}` must be a JSON object")]
    InvalidPayload { field: &'static str },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Another dispatcher already reads this event name on the transport.
    #[error("a dispatcher is already installed for event `{event}`")]
    DispatcherInstalled { event: String },

    #[error("request {request_id} was cancelled")]
    Cancelled { request_id: RequestId },

    #[error("request {request_id} timed out after {after:?}")]
    Timeout { request_id: RequestId, after: Duration },

    #[error("channel closed")]
    ChannelClosed,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl MuxError {
    /// The rejected response, if this is a protocol-level failure.
    pub fn response(&self) -> Option<&ResponseEnvelope> {
        match self {
            MuxError::Rejected(response) => Some(&**response),
            _ => None,
        }
    }

    /// Status code of a rejected response.
    pub fn status(&self) -> Option<i64> {
        self.response().map(|r| r.status)
    }
}
