//! In-memory loopback transport.
//!
//! Records every outbound envelope per event name and lets the peer side
//! (usually a test) inject inbound envelopes synchronously. Suitable for tests
//! and local wiring; a networked deployment plugs a real duplex transport into
//! the same [`Transport`] port.

use crate::domain::correlation::RequestId;
use crate::domain::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::domain::verb::Verb;
use crate::ports::{InboundHandler, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// In-memory implementation of the transport port.
#[derive(Default)]
pub struct MemoryTransport {
    /// Inbound handler per event name.
    handlers: Mutex<HashMap<String, InboundHandler>>,

    /// Outbound envelopes per event name, in send order.
    sent: Mutex<HashMap<String, Vec<RequestEnvelope>>>,

    /// When set, every send fails with `TransportError::Closed`.
    fail_sends: AtomicBool,

    /// Total envelopes sent.
    envelopes_sent: AtomicU64,

    /// Total envelopes delivered to a handler.
    envelopes_delivered: AtomicU64,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Envelopes sent on `event` so far.
    pub fn sent(&self, event: &str) -> Vec<RequestEnvelope> {
        self.sent.lock().get(event).cloned().unwrap_or_default()
    }

    /// Drain the envelopes sent on `event`.
    pub fn take_sent(&self, event: &str) -> Vec<RequestEnvelope> {
        self.sent.lock().remove(event).unwrap_or_default()
    }

    /// Most recent envelope sent on `event`.
    pub fn last_sent(&self, event: &str) -> Option<RequestEnvelope> {
        self.sent.lock().get(event).and_then(|v| v.last().cloned())
    }

    pub fn envelopes_sent(&self) -> u64 {
        self.envelopes_sent.load(Ordering::Relaxed)
    }

    pub fn envelopes_delivered(&self) -> u64 {
        self.envelopes_delivered.load(Ordering::Relaxed)
    }

    /// Deliver an inbound envelope on `event`.
    ///
    /// Returns false when no handler is registered (the envelope is lost).
    pub fn deliver(&self, event: &str, envelope: ResponseEnvelope) -> bool {
        let handler = self.handlers.lock().get(event).cloned();
        match handler {
            Some(handler) => {
                self.envelopes_delivered.fetch_add(1, Ordering::Relaxed);
                handler(envelope);
                true
            }
            None => {
                debug!(event = event, "No inbound handler, envelope lost");
                false
            }
        }
    }

    /// Decode raw JSON text and deliver it on `event`.
    pub fn deliver_json(&self, event: &str, text: &str) -> Result<bool, serde_json::Error> {
        let envelope = ResponseEnvelope::from_json(text).map_err(|e| {
            warn!(event = event, error = %e, "Malformed inbound envelope");
            e
        })?;
        Ok(self.deliver(event, envelope))
    }

    /// Answer a previously sent request-style envelope.
    pub fn respond(
        &self,
        event: &str,
        request: &RequestEnvelope,
        status: i64,
        data: Value,
    ) -> bool {
        self.deliver(
            event,
            ResponseEnvelope {
                method: request.method,
                action: request.action.clone(),
                request_id: request.request_id.clone(),
                status,
                data,
            },
        )
    }

    /// Push a subscription envelope for `action`.
    pub fn push(&self, event: &str, action: &str, data: Value) -> bool {
        self.deliver(
            event,
            ResponseEnvelope {
                method: Verb::Subscription,
                action: action.to_string(),
                request_id: RequestId::generate(),
                status: 200,
                data,
            },
        )
    }
}

impl Transport for MemoryTransport {
    fn send(&self, event: &str, envelope: RequestEnvelope) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        debug!(
            event = event,
            request_id = %envelope.request_id,
            method = %envelope.method,
            action = %envelope.action,
            "Envelope sent"
        );

        self.sent
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(envelope);
        self.envelopes_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_receive(&self, event: &str, handler: InboundHandler) {
        self.handlers.lock().insert(event.to_string(), handler);
    }

    fn listener(&self, event: &str) -> Option<InboundHandler> {
        self.handlers.lock().get(event).cloned()
    }

    fn remove_listener(&self, event: &str) -> bool {
        self.handlers.lock().remove(event).is_some()
    }
}
