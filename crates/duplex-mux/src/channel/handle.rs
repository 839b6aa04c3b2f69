//! Cancellation handles returned by `emit` and `subscribe`.

use crate::domain::config::CancelScope;
use crate::domain::correlation::RequestId;
use crate::domain::verb::Verb;
use crate::registry::{Registry, SubscriberId};
use std::sync::Weak;

/// What one `emit` call registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Entry keyed by `(method, action, request_id)`.
    Request {
        method: Verb,
        action: String,
        request_id: RequestId,
    },
    /// One subscriber in the `action` bucket.
    Subscriber { action: String, id: SubscriberId },
}

/// Removes the registration created by one `emit` call.
///
/// Holds only a weak reference to the registry: a handle outliving its channel
/// cancels nothing.
#[derive(Debug, Clone)]
pub struct EmitHandle {
    registry: Weak<Registry>,
    registration: Registration,
    request_id: RequestId,
    scope: CancelScope,
}

impl EmitHandle {
    pub(crate) fn new(
        registry: Weak<Registry>,
        registration: Registration,
        request_id: RequestId,
        scope: CancelScope,
    ) -> Self {
        Self {
            registry,
            registration,
            request_id,
            scope,
        }
    }

    /// Remove the registration. Returns true if anything was removed.
    ///
    /// Subscriptions honor the channel's [`CancelScope`]: with
    /// `CancelScope::Action` every subscriber on the action is removed.
    pub fn cancel(&self) -> bool {
        match self.scope {
            CancelScope::Subscriber => self.remove_own(),
            CancelScope::Action => match &self.registration {
                Registration::Subscriber { .. } => self.remove_bucket() > 0,
                Registration::Request { .. } => self.remove_own(),
            },
        }
    }

    /// Request id carried by the outbound envelope.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Whether the registration is still present.
    pub fn is_active(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        match &self.registration {
            Registration::Request {
                method,
                action,
                request_id,
            } => registry.is_pending(*method, action, request_id),
            Registration::Subscriber { action, id } => registry.has_subscriber(action, *id),
        }
    }

    /// Remove exactly this registration, ignoring the scope.
    pub(crate) fn remove_own(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        match &self.registration {
            Registration::Request {
                method,
                action,
                request_id,
            } => registry.remove_request(*method, action, request_id),
            Registration::Subscriber { action, id } => registry.remove_subscriber(action, *id),
        }
    }

    /// Remove the whole subscription bucket this registration lives in.
    pub(crate) fn remove_bucket(&self) -> usize {
        let Some(registry) = self.registry.upgrade() else {
            return 0;
        };
        match &self.registration {
            Registration::Subscriber { action, .. } => registry.remove_action(action),
            Registration::Request { .. } => 0,
        }
    }
}

/// Handle for a subscription created by `subscribe` or `listen`.
///
/// Dropping the handle leaves the subscription in place.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    handle: EmitHandle,
    action: String,
    id: SubscriberId,
}

impl SubscriptionHandle {
    pub(crate) fn new(handle: EmitHandle, action: String, id: SubscriberId) -> Self {
        Self { handle, action, id }
    }

    /// Cancel per the channel's [`CancelScope`].
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    /// Cancel every subscriber on this action, including other callers'.
    pub fn cancel_action(&self) -> usize {
        self.handle.remove_bucket()
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Request id of the SUBSCRIPTION envelope that opened this subscription.
    pub fn request_id(&self) -> &RequestId {
        self.handle.request_id()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    pub(crate) fn remove_own(&self) -> bool {
        self.handle.remove_own()
    }
}
