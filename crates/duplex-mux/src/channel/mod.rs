//! Channel: one event name on one transport, with its own registry.
//!
//! ```text
//!  request / subscribe / listen
//!              │
//!              ▼
//!            emit ──register──► Registry ◄──lookup── Dispatcher
//!              │                                        ▲
//!              └──send──► Transport ──on_receive────────┘
//! ```
//!
//! The dispatcher is installed when the channel opens. `close` (or dropping the
//! last clone) clears the registry and detaches the dispatcher; outstanding
//! requests then resolve with [`MuxError::ChannelClosed`].

mod handle;
mod listen;
mod request;
mod stream;
mod verbs;

pub use handle::{EmitHandle, Registration, SubscriptionHandle};
pub use listen::{ListenOptions, Listening};
pub use request::PendingResponse;
pub use stream::PushStream;

use crate::adapters::UuidIdGenerator;
use crate::dispatcher::Dispatcher;
use crate::domain::config::ChannelConfig;
use crate::domain::correlation::RequestId;
use crate::domain::envelope::{ActionOptions, RequestEnvelope, RequestOptions, ResponseEnvelope};
use crate::domain::error::{MuxError, MuxResult};
use crate::domain::verb::Verb;
use crate::ports::{IdGenerator, InboundHandler, Transport};
use crate::registry::{Listener, Registry, StatsSnapshot};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct ChannelInner {
    config: ChannelConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    /// The handler this channel installs; compared by pointer to tell our
    /// binding from another channel's.
    handler: InboundHandler,
    ids: Arc<dyn IdGenerator>,
}

impl ChannelInner {
    fn event(&self) -> &str {
        &self.config.event_name
    }

    fn owns_binding(&self) -> bool {
        self.transport
            .listener(self.event())
            .is_some_and(|installed| Arc::ptr_eq(&installed, &self.handler))
    }

    /// Reattach the dispatcher if the transport lost it (e.g. after a reconnect
    /// that reset its listeners). The registry is left untouched.
    ///
    /// Fails if another channel bound the event name in the meantime: replies
    /// would reach that channel's registry instead of ours.
    fn ensure_dispatcher(&self) -> MuxResult<()> {
        match self.transport.listener(self.event()) {
            Some(installed) if Arc::ptr_eq(&installed, &self.handler) => Ok(()),
            Some(_) => {
                warn!(event = %self.event(), "Event name bound by another channel");
                Err(MuxError::DispatcherInstalled {
                    event: self.event().to_string(),
                })
            }
            None => {
                self.transport.on_receive(self.event(), self.handler.clone());
                debug!(event = %self.event(), "Dispatcher reinstalled");
                Ok(())
            }
        }
    }

    fn close(&self) -> usize {
        if self.registry.is_closed() {
            return 0;
        }
        let removed = self.registry.close();
        if self.owns_binding() {
            self.transport.remove_listener(self.event());
        }
        info!(event = %self.event(), removed = removed, "Channel closed");
        removed
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Multiplexed request/response and subscription channel.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Open a channel with UUID v4 request ids.
    pub fn open(transport: Arc<dyn Transport>, config: ChannelConfig) -> MuxResult<Self> {
        Self::open_with_ids(transport, config, Arc::new(UuidIdGenerator))
    }

    /// Open a channel with a custom id generator.
    ///
    /// Fails if the event name already has a listener on this transport:
    /// a second dispatcher would deliver every inbound envelope twice.
    pub fn open_with_ids(
        transport: Arc<dyn Transport>,
        config: ChannelConfig,
        ids: Arc<dyn IdGenerator>,
    ) -> MuxResult<Self> {
        config.validate()?;

        if transport.has_listener(&config.event_name) {
            return Err(MuxError::DispatcherInstalled {
                event: config.event_name.clone(),
            });
        }

        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::new(config.event_name.clone(), registry.clone());
        let handler = dispatcher.clone().into_handler();
        transport.on_receive(&config.event_name, handler.clone());

        info!(
            event = %config.event_name,
            cancel_scope = %config.cancel_scope,
            request_timeout_ms = ?config.request_timeout_ms,
            "Channel opened"
        );

        Ok(Self {
            inner: Arc::new(ChannelInner {
                config,
                transport,
                registry,
                dispatcher,
                handler,
                ids,
            }),
        })
    }

    /// Register `listener` and send the envelope with a generated request id.
    pub fn emit(&self, options: RequestOptions, listener: Listener) -> MuxResult<EmitHandle> {
        let request_id = self.inner.ids.next_id();
        self.emit_with_id(options, listener, request_id)
    }

    /// Register `listener` and send the envelope under `request_id`.
    ///
    /// The listener shape must match the verb kind. If the transport refuses the
    /// envelope the registration is rolled back and the transport error returned.
    pub fn emit_with_id(
        &self,
        options: RequestOptions,
        listener: Listener,
        request_id: RequestId,
    ) -> MuxResult<EmitHandle> {
        let inner = &self.inner;
        if !listener.matches(options.method) {
            return Err(MuxError::InvalidListener {
                method: options.method,
            });
        }

        let envelope = RequestEnvelope::build(request_id.clone(), &options)?;

        let registration = match listener {
            Listener::Response(handlers) => {
                inner.registry.register_request(
                    options.method,
                    &options.action,
                    request_id.clone(),
                    handlers,
                )?;
                Registration::Request {
                    method: options.method,
                    action: options.action,
                    request_id,
                }
            }
            Listener::Push(on_push) => {
                let id = inner.registry.register_subscriber(&options.action, on_push)?;
                Registration::Subscriber {
                    action: options.action,
                    id,
                }
            }
        };

        self.send_registered(envelope, registration)
    }

    /// Send an envelope whose listener is already registered, rolling the
    /// registration back on failure.
    fn send_registered(
        &self,
        envelope: RequestEnvelope,
        registration: Registration,
    ) -> MuxResult<EmitHandle> {
        let inner = &self.inner;
        let handle = EmitHandle::new(
            Arc::downgrade(&inner.registry),
            registration,
            envelope.request_id.clone(),
            inner.config.cancel_scope,
        );

        if let Err(e) = inner.ensure_dispatcher() {
            handle.remove_own();
            return Err(e);
        }

        if let Err(e) = inner.transport.send(inner.event(), envelope) {
            handle.remove_own();
            warn!(
                event = %inner.event(),
                request_id = %handle.request_id(),
                error = %e,
                "Send failed, registration rolled back"
            );
            return Err(e.into());
        }

        Ok(handle)
    }

    /// Subscribe to every push for `options.action`.
    pub fn subscribe<F>(&self, options: ActionOptions, on_push: F) -> MuxResult<SubscriptionHandle>
    where
        F: Fn(&ResponseEnvelope) + Send + Sync + 'static,
    {
        let inner = &self.inner;
        let options = options.with_method(Verb::Subscription);
        let envelope = RequestEnvelope::build(inner.ids.next_id(), &options)?;
        let id = inner
            .registry
            .register_subscriber(&options.action, Arc::new(on_push))?;

        let registration = Registration::Subscriber {
            action: options.action.clone(),
            id,
        };
        let handle = self.send_registered(envelope, registration)?;
        Ok(SubscriptionHandle::new(handle, options.action, id))
    }

    /// Clear the registry and detach from the transport.
    ///
    /// Returns the number of registrations dropped. Later operations fail with
    /// [`MuxError::ChannelClosed`].
    pub fn close(&self) -> usize {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.registry.is_closed()
    }

    pub fn event_name(&self) -> &str {
        self.inner.event()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Request-style exchanges still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.inner.registry.pending_count()
    }

    pub fn subscriber_count(&self, action: &str) -> usize {
        self.inner.registry.subscriber_count(action)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.registry.stats().snapshot()
    }

    /// The dispatcher bound to this channel's event name.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }
}
