//! Subscriptions consumed as a [`Stream`].

use super::{Channel, SubscriptionHandle};
use crate::domain::envelope::{ActionOptions, ResponseEnvelope};
use crate::domain::error::MuxResult;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// Stream of pushes for one action.
///
/// Ends when the subscription is cancelled or the channel is closed. Dropping
/// the stream removes only its own subscriber.
pub struct PushStream {
    inner: UnboundedReceiverStream<ResponseEnvelope>,
    handle: SubscriptionHandle,
}

impl PushStream {
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }
}

impl Stream for PushStream {
    type Item = ResponseEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for PushStream {
    fn drop(&mut self) {
        if self.handle.remove_own() {
            debug!(action = %self.handle.action(), "Push stream dropped, subscriber removed");
        }
    }
}

impl Channel {
    /// Subscribe to `options.action` and receive pushes as a stream.
    pub fn subscribe_stream(&self, options: ActionOptions) -> MuxResult<PushStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.subscribe(options, move |push: &ResponseEnvelope| {
            // Receiver gone means the stream is being dropped.
            let _ = tx.send(push.clone());
        })?;
        Ok(PushStream {
            inner: UnboundedReceiverStream::new(rx),
            handle,
        })
    }
}
