//! Single-shot request/response exchanges.

use super::{Channel, EmitHandle};
use crate::domain::correlation::RequestId;
use crate::domain::envelope::{RequestOptions, Response, ResponseEnvelope};
use crate::domain::error::{MuxError, MuxResult};
use crate::registry::{Listener, Registry};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep};
use tracing::{debug, warn};

type Outcome = Result<ResponseEnvelope, ResponseEnvelope>;
type OutcomeSlot = Arc<Mutex<Option<oneshot::Sender<Outcome>>>>;

impl Channel {
    /// Send one request and wait for its single response.
    ///
    /// The registration is removed as soon as a response arrives, so duplicates
    /// are dropped by the dispatcher. Non-2xx responses fail with
    /// [`MuxError::Rejected`].
    pub fn request<T: DeserializeOwned>(
        &self,
        options: RequestOptions,
    ) -> MuxResult<PendingResponse<T>> {
        let (tx, rx) = oneshot::channel();
        let slot: OutcomeSlot = Arc::new(Mutex::new(Some(tx)));
        let registry = Arc::downgrade(self.registry());

        let listener = Listener::response(
            completer(slot.clone(), registry.clone(), Ok),
            completer(slot, registry.clone(), Err),
        );
        let handle = self.emit(options, listener)?;

        let mut pending = PendingResponse {
            request_id: handle.request_id().clone(),
            handle,
            registry,
            rx,
            timeout: None,
            sleep: None,
            done: false,
            _marker: PhantomData,
        };
        if let Some(timeout) = self.config().request_timeout() {
            pending = pending.with_timeout(timeout);
        }
        Ok(pending)
    }
}

/// Build a response callback that completes the exchange once and removes the
/// registration it was invoked for.
fn completer(
    slot: OutcomeSlot,
    registry: Weak<Registry>,
    wrap: fn(ResponseEnvelope) -> Outcome,
) -> impl Fn(&ResponseEnvelope) + Send + Sync + 'static {
    move |envelope: &ResponseEnvelope| {
        if let Some(registry) = registry.upgrade() {
            registry.remove_request(envelope.method, &envelope.action, &envelope.request_id);
        }
        if let Some(tx) = slot.lock().take() {
            // Receiver may already be gone; nothing left to notify.
            let _ = tx.send(wrap(envelope.clone()));
        }
    }
}

/// Future for the response to one request.
///
/// Resolves with the decoded [`Response`], or fails with
/// [`MuxError::Rejected`], [`MuxError::Decode`], [`MuxError::Cancelled`],
/// [`MuxError::Timeout`] or [`MuxError::ChannelClosed`]. Dropping it before it
/// resolves cancels the registration.
#[must_use = "a request is cancelled when its PendingResponse is dropped"]
pub struct PendingResponse<T> {
    request_id: RequestId,
    handle: EmitHandle,
    registry: Weak<Registry>,
    rx: oneshot::Receiver<Outcome>,
    timeout: Option<(Instant, Duration)>,
    sleep: Option<Pin<Box<Sleep>>>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PendingResponse<T> {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Remove the registration; the future then resolves with
    /// [`MuxError::Cancelled`]. Returns false if it was already gone.
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_active()
    }

    /// Fail with [`MuxError::Timeout`] if no response arrives within `after`,
    /// counted from now. Replaces any channel-wide timeout.
    pub fn with_timeout(mut self, after: Duration) -> Self {
        self.timeout = Some((Instant::now() + after, after));
        self.sleep = None;
        self
    }

    fn settle(&self, received: Result<Outcome, oneshot::error::RecvError>) -> MuxResult<Response<T>>
    where
        T: DeserializeOwned,
    {
        match received {
            Ok(Ok(envelope)) => {
                debug!(
                    request_id = %self.request_id,
                    status = envelope.status,
                    "Request completed"
                );
                envelope.decode()
            }
            Ok(Err(envelope)) => {
                debug!(request_id = %self.request_id, status = envelope.status, "Request rejected");
                Err(MuxError::Rejected(Box::new(envelope)))
            }
            Err(_) => {
                let closed = self
                    .registry
                    .upgrade()
                    .map_or(true, |registry| registry.is_closed());
                if closed {
                    Err(MuxError::ChannelClosed)
                } else {
                    Err(MuxError::Cancelled {
                        request_id: self.request_id.clone(),
                    })
                }
            }
        }
    }
}

impl<T: DeserializeOwned> Future for PendingResponse<T> {
    type Output = MuxResult<Response<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Poll::Ready(received) = Pin::new(&mut this.rx).poll(cx) {
            this.done = true;
            return Poll::Ready(this.settle(received));
        }

        if let Some((deadline, after)) = this.timeout {
            let sleep = this
                .sleep
                .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
            if sleep.as_mut().poll(cx).is_ready() {
                this.done = true;
                this.handle.remove_own();
                warn!(
                    request_id = %this.request_id,
                    after_ms = after.as_millis() as u64,
                    "Request timed out"
                );
                return Poll::Ready(Err(MuxError::Timeout {
                    request_id: this.request_id.clone(),
                    after,
                }));
            }
        }

        Poll::Pending
    }
}

impl<T> Drop for PendingResponse<T> {
    fn drop(&mut self) {
        if !self.done && self.handle.remove_own() {
            debug!(request_id = %self.request_id, "Abandoned request cancelled");
        }
    }
}

impl<T> std::fmt::Debug for PendingResponse<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("request_id", &self.request_id)
            .field("timeout", &self.timeout.map(|(_, after)| after))
            .field("done", &self.done)
            .finish()
    }
}
