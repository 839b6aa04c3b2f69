//! Request-then-filtered-subscribe composite.

use super::{Channel, PendingResponse, SubscriptionHandle};
use crate::domain::envelope::{ActionOptions, Response, ResponseEnvelope};
use crate::domain::error::MuxResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::hash::Hash;
use tracing::debug;

/// Subscription target plus the key extraction used to filter pushes.
///
/// `selectors` derives the key set from the initial response; `selector`
/// extracts a key from each push payload.
pub struct ListenOptions<S, F> {
    pub options: ActionOptions,
    pub selector: S,
    pub selectors: F,
}

impl<S, F> ListenOptions<S, F> {
    pub fn new<T, K, I>(options: ActionOptions, selector: S, selectors: F) -> Self
    where
        S: Fn(&Value) -> Option<K>,
        F: FnOnce(&Response<T>, &S) -> I,
        I: IntoIterator<Item = K>,
    {
        Self {
            options,
            selector,
            selectors,
        }
    }
}

/// Result of a successful [`Channel::listen`].
#[derive(Debug)]
pub struct Listening<T> {
    /// Response to the initial request.
    pub initial: Response<T>,
    /// Filtered subscription; independent of the request.
    pub subscription: SubscriptionHandle,
}

impl Channel {
    /// Await `pending`, then subscribe to `options.action` and forward only the
    /// pushes whose selected key belongs to the set derived from the response.
    ///
    /// A failed request is returned as is and nothing is subscribed. Pushes
    /// that arrive before the request resolves are not delivered.
    pub async fn listen<T, K, S, F, I, P>(
        &self,
        pending: PendingResponse<T>,
        listen: ListenOptions<S, F>,
        on_push: P,
    ) -> MuxResult<Listening<T>>
    where
        T: DeserializeOwned,
        K: Eq + Hash + Send + Sync + 'static,
        S: Fn(&Value) -> Option<K> + Send + Sync + 'static,
        F: FnOnce(&Response<T>, &S) -> I,
        I: IntoIterator<Item = K>,
        P: Fn(&ResponseEnvelope) + Send + Sync + 'static,
    {
        let initial = pending.await?;

        let ListenOptions {
            options,
            selector,
            selectors,
        } = listen;
        let keys: HashSet<K> = selectors(&initial, &selector).into_iter().collect();
        debug!(
            action = %options.action,
            keys = keys.len(),
            "Listening for selected pushes"
        );

        let subscription = self.subscribe(options, move |push: &ResponseEnvelope| {
            if selector(&push.data).is_some_and(|key| keys.contains(&key)) {
                on_push(push);
            }
        })?;

        Ok(Listening {
            initial,
            subscription,
        })
    }
}
