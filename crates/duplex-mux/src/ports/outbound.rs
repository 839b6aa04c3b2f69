//! Outbound ports for the channel multiplexer.
//!
//! The duplex transport and the id generator are external collaborators; the
//! core only talks to them through these traits.

use crate::domain::correlation::RequestId;
use crate::domain::envelope::{RequestEnvelope, ResponseEnvelope};
use std::sync::Arc;
use thiserror::Error;

/// Handler the transport calls for every inbound envelope on one event name.
pub type InboundHandler = Arc<dyn Fn(ResponseEnvelope) + Send + Sync>;

/// Transport failure, propagated unchanged to the caller of `emit`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
}

/// Persistent full-duplex message transport.
///
/// Implementations must deliver inbound envelopes for one event name one at a
/// time, in the order they were produced.
pub trait Transport: Send + Sync {
    /// Send an envelope on `event`.
    fn send(&self, event: &str, envelope: RequestEnvelope) -> Result<(), TransportError>;

    /// Register the inbound handler for `event`, replacing any previous one.
    fn on_receive(&self, event: &str, handler: InboundHandler);

    /// The handler registered for `event`, if any.
    fn listener(&self, event: &str) -> Option<InboundHandler>;

    /// Whether a handler is registered for `event`.
    fn has_listener(&self, event: &str) -> bool {
        self.listener(event).is_some()
    }

    /// Remove the handler for `event`. Returns true if one was registered.
    fn remove_listener(&self, event: &str) -> bool;
}

/// Source of fresh request ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> RequestId;
}
