//! Inbound dispatcher.
//!
//! The single reader of one event name on the transport. Routes each inbound
//! envelope to the registry entries matching its verb and action (and, for
//! request-style verbs, its request id). Envelopes nobody waits for are
//! dropped: a late response after cancellation, a duplicate after completion,
//! or a push racing an unsubscribe are expected, not protocol violations.

use crate::domain::envelope::ResponseEnvelope;
use crate::ports::InboundHandler;
use crate::registry::Registry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why an inbound envelope reached no callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Push for an action with no subscribers.
    OrphanPush,
    /// Response with no matching pending request.
    DanglingResponse,
    /// Inbound text that is not an envelope.
    Malformed,
}

/// What the dispatcher did with one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Push handed to this many subscribers.
    Pushed { subscribers: usize },
    /// `on_success` invoked.
    Succeeded,
    /// `on_error` invoked.
    Failed,
    Dropped(DropReason),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        !matches!(self, DispatchOutcome::Dropped(_))
    }
}

/// Routes inbound envelopes for one event name.
#[derive(Clone)]
pub struct Dispatcher {
    event: String,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(event: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            event: event.into(),
            registry,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Route one inbound envelope.
    pub fn dispatch(&self, envelope: &ResponseEnvelope) -> DispatchOutcome {
        let outcome = if envelope.method.is_subscription() {
            self.dispatch_push(envelope)
        } else {
            self.dispatch_response(envelope)
        };

        let counter = if outcome.is_delivered() {
            &self.registry.stats().total_delivered
        } else {
            &self.registry.stats().total_dropped
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Decode raw JSON text and route it. Malformed text is dropped.
    pub fn dispatch_json(&self, text: &str) -> DispatchOutcome {
        match ResponseEnvelope::from_json(text) {
            Ok(envelope) => self.dispatch(&envelope),
            Err(e) => {
                warn!(event = %self.event, error = %e, "Dropping malformed inbound envelope");
                self.registry
                    .stats()
                    .total_dropped
                    .fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Dropped(DropReason::Malformed)
            }
        }
    }

    /// Wrap this dispatcher as a transport handler.
    pub fn into_handler(self) -> InboundHandler {
        Arc::new(move |envelope: ResponseEnvelope| {
            self.dispatch(&envelope);
        })
    }

    fn dispatch_push(&self, envelope: &ResponseEnvelope) -> DispatchOutcome {
        let subscribers = self.registry.subscribers(&envelope.action);
        if subscribers.is_empty() {
            debug!(
                event = %self.event,
                action = %envelope.action,
                "Dropping push with no subscribers"
            );
            return DispatchOutcome::Dropped(DropReason::OrphanPush);
        }

        for on_push in &subscribers {
            on_push(envelope);
        }

        debug!(
            event = %self.event,
            action = %envelope.action,
            subscribers = subscribers.len(),
            "Push delivered"
        );
        DispatchOutcome::Pushed {
            subscribers: subscribers.len(),
        }
    }

    fn dispatch_response(&self, envelope: &ResponseEnvelope) -> DispatchOutcome {
        let Some(handlers) =
            self.registry
                .lookup_request(envelope.method, &envelope.action, &envelope.request_id)
        else {
            debug!(
                event = %self.event,
                method = %envelope.method,
                action = %envelope.action,
                request_id = %envelope.request_id,
                "Dropping response for unknown or completed request"
            );
            return DispatchOutcome::Dropped(DropReason::DanglingResponse);
        };

        debug!(
            event = %self.event,
            method = %envelope.method,
            action = %envelope.action,
            request_id = %envelope.request_id,
            status = envelope.status,
            "Response delivered"
        );

        if envelope.is_success() {
            (handlers.on_success)(envelope);
            DispatchOutcome::Succeeded
        } else {
            (handlers.on_error)(envelope);
            DispatchOutcome::Failed
        }
    }
}
