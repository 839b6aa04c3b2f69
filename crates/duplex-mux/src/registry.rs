//! Registration table for in-flight exchanges and subscriptions.
//!
//! Two tables behind one facade:
//!
//! ```text
//! requests:      Verb ──► action ──► RequestId ──► ResponseHandlers
//! subscriptions:           action ──► [(SubscriberId, PushCallback), ...]
//! ```
//!
//! Buckets are created on first registration and pruned as soon as they become
//! empty. All state sits behind one mutex; callbacks are handed out as `Arc`
//! clones so the dispatcher can invoke them after the lock is released, which
//! lets a callback cancel or register without deadlocking.

use crate::domain::correlation::RequestId;
use crate::domain::envelope::ResponseEnvelope;
use crate::domain::error::MuxError;
use crate::domain::verb::Verb;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Callback receiving a full inbound envelope.
pub type ResponseCallback = Arc<dyn Fn(&ResponseEnvelope) + Send + Sync>;

/// Callback receiving every push for a subscribed action.
pub type PushCallback = Arc<dyn Fn(&ResponseEnvelope) + Send + Sync>;

/// Success/error callback pair for one request-style exchange.
#[derive(Clone)]
pub struct ResponseHandlers {
    /// Called when status is in [200, 300)
    pub on_success: ResponseCallback,
    /// Called for any other status
    pub on_error: ResponseCallback,
}

impl ResponseHandlers {
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: Fn(&ResponseEnvelope) + Send + Sync + 'static,
        E: Fn(&ResponseEnvelope) + Send + Sync + 'static,
    {
        Self {
            on_success: Arc::new(on_success),
            on_error: Arc::new(on_error),
        }
    }
}

impl fmt::Debug for ResponseHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandlers").finish_non_exhaustive()
    }
}

/// Listener passed to `emit`; its shape must match the verb kind.
#[derive(Clone)]
pub enum Listener {
    /// For GET/POST/PUT/PATCH/DELETE.
    Response(ResponseHandlers),
    /// For SUBSCRIPTION.
    Push(PushCallback),
}

impl Listener {
    pub fn response<S, E>(on_success: S, on_error: E) -> Self
    where
        S: Fn(&ResponseEnvelope) + Send + Sync + 'static,
        E: Fn(&ResponseEnvelope) + Send + Sync + 'static,
    {
        Listener::Response(ResponseHandlers::new(on_success, on_error))
    }

    pub fn push<F>(on_push: F) -> Self
    where
        F: Fn(&ResponseEnvelope) + Send + Sync + 'static,
    {
        Listener::Push(Arc::new(on_push))
    }

    /// Whether this listener shape fits `verb`.
    pub fn matches(&self, verb: Verb) -> bool {
        match self {
            Listener::Response(_) => verb.is_request_style(),
            Listener::Push(_) => verb.is_subscription(),
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Response(_) => f.write_str("Listener::Response"),
            Listener::Push(_) => f.write_str("Listener::Push"),
        }
    }
}

/// Identity of one subscriber within its action bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Registry counters
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Total registrations (requests and subscribers)
    pub total_registered: AtomicU64,
    /// Total inbound envelopes routed to at least one callback
    pub total_delivered: AtomicU64,
    /// Total inbound envelopes dropped (dangling, orphan, malformed)
    pub total_dropped: AtomicU64,
    /// Total registrations removed (completion, cancel, close)
    pub total_removed: AtomicU64,
}

impl RegistryStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            delivered: self.total_delivered.load(Ordering::Relaxed),
            dropped: self.total_dropped.load(Ordering::Relaxed),
            removed: self.total_removed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RegistryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub removed: u64,
}

#[derive(Default)]
struct RegistryState {
    requests: HashMap<Verb, HashMap<String, HashMap<RequestId, ResponseHandlers>>>,
    subscriptions: HashMap<String, Vec<(SubscriberId, PushCallback)>>,
    next_subscriber: u64,
    closed: bool,
}

/// Registration table owned by one channel.
#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
    stats: RegistryStats,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request-style exchange, overwriting any entry with the same key.
    pub fn register_request(
        &self,
        verb: Verb,
        action: &str,
        request_id: RequestId,
        handlers: ResponseHandlers,
    ) -> Result<(), MuxError> {
        if verb.is_subscription() {
            return Err(MuxError::InvalidListener { method: verb });
        }

        let mut state = self.state.lock();
        if state.closed {
            return Err(MuxError::ChannelClosed);
        }

        debug!(
            method = %verb,
            action = action,
            request_id = %request_id,
            "Registered pending request"
        );

        state
            .requests
            .entry(verb)
            .or_default()
            .entry(action.to_string())
            .or_default()
            .insert(request_id, handlers);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Handlers for `(verb, action, request_id)`, if still registered.
    pub fn lookup_request(
        &self,
        verb: Verb,
        action: &str,
        request_id: &RequestId,
    ) -> Option<ResponseHandlers> {
        self.state
            .lock()
            .requests
            .get(&verb)
            .and_then(|actions| actions.get(action))
            .and_then(|pending| pending.get(request_id))
            .cloned()
    }

    /// Remove one request-style entry. Returns false if it was not present.
    pub fn remove_request(&self, verb: Verb, action: &str, request_id: &RequestId) -> bool {
        let mut state = self.state.lock();
        let Some(actions) = state.requests.get_mut(&verb) else {
            return false;
        };
        let Some(pending) = actions.get_mut(action) else {
            return false;
        };
        if pending.remove(request_id).is_none() {
            return false;
        }

        if pending.is_empty() {
            actions.remove(action);
        }
        if actions.is_empty() {
            state.requests.remove(&verb);
        }

        self.stats.total_removed.fetch_add(1, Ordering::Relaxed);
        debug!(
            method = %verb,
            action = action,
            request_id = %request_id,
            "Removed pending request"
        );
        true
    }

    /// Append a subscriber to the action bucket.
    pub fn register_subscriber(
        &self,
        action: &str,
        on_push: PushCallback,
    ) -> Result<SubscriberId, MuxError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(MuxError::ChannelClosed);
        }

        state.next_subscriber += 1;
        let id = SubscriberId(state.next_subscriber);
        state
            .subscriptions
            .entry(action.to_string())
            .or_default()
            .push((id, on_push));
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(action = action, subscriber = %id, "Registered subscriber");
        Ok(id)
    }

    /// Push callbacks for `action`, in registration order.
    pub fn subscribers(&self, action: &str) -> Vec<PushCallback> {
        self.state
            .lock()
            .subscriptions
            .get(action)
            .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }

    /// Remove a single subscriber. Returns false if it was not present.
    pub fn remove_subscriber(&self, action: &str, id: SubscriberId) -> bool {
        let mut state = self.state.lock();
        let Some(subs) = state.subscriptions.get_mut(action) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            state.subscriptions.remove(action);
        }

        if removed {
            self.stats.total_removed.fetch_add(1, Ordering::Relaxed);
            debug!(action = action, subscriber = %id, "Removed subscriber");
        }
        removed
    }

    /// Remove the whole subscription bucket for `action`.
    ///
    /// Returns the number of subscribers removed.
    pub fn remove_action(&self, action: &str) -> usize {
        let removed = self
            .state
            .lock()
            .subscriptions
            .remove(action)
            .map(|subs| subs.len())
            .unwrap_or(0);

        if removed > 0 {
            self.stats
                .total_removed
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(action = action, removed = removed, "Removed subscription bucket");
        }
        removed
    }

    /// Drop every registration and refuse new ones.
    ///
    /// Returns the number of registrations removed.
    pub fn close(&self) -> usize {
        let (requests, subscriptions) = {
            let mut state = self.state.lock();
            state.closed = true;
            (
                std::mem::take(&mut state.requests),
                std::mem::take(&mut state.subscriptions),
            )
        };

        let removed = requests
            .values()
            .flat_map(|actions| actions.values())
            .map(|pending| pending.len())
            .sum::<usize>()
            + subscriptions.values().map(|subs| subs.len()).sum::<usize>();
        self.stats
            .total_removed
            .fetch_add(removed as u64, Ordering::Relaxed);

        // Handlers are dropped here, outside the lock.
        drop(requests);
        drop(subscriptions);
        removed
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of request-style exchanges still registered.
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .requests
            .values()
            .flat_map(|actions| actions.values())
            .map(|pending| pending.len())
            .sum()
    }

    pub fn is_pending(&self, verb: Verb, action: &str, request_id: &RequestId) -> bool {
        self.lookup_request(verb, action, request_id).is_some()
    }

    pub fn has_subscriber(&self, action: &str, id: SubscriberId) -> bool {
        self.state
            .lock()
            .subscriptions
            .get(action)
            .is_some_and(|subs| subs.iter().any(|(sub_id, _)| *sub_id == id))
    }

    /// Subscribers registered on `action`.
    pub fn subscriber_count(&self, action: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(action)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Subscribers across all actions.
    pub fn total_subscribers(&self) -> usize {
        self.state.lock().subscriptions.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}
