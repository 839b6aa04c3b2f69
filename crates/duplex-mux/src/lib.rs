//! Request/response and publish/subscribe multiplexing over one duplex channel.
//!
//! Many logical exchanges share a single bidirectional message channel,
//! distinguished by an event name. Every outbound envelope carries a verb, an
//! action and a request id; inbound envelopes are routed back to whoever is
//! waiting for them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Channel                               │
//! │  request / get / post / put / patch / delete                  │
//! │  subscribe / subscribe_stream / listen                        │
//! │                │                                              │
//! │             emit ──register──► Registry ◄──lookup──┐          │
//! │                │               requests: verb→action→id       │
//! │                │               subscriptions: action→[subs]   │
//! │                ▼                                   │          │
//! │          Transport port ──────on_receive──────► Dispatcher    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Request-style** verbs (GET, POST, PUT, PATCH, DELETE) expect one
//!   response correlated by `(method, action, requestId)`.
//! - **SUBSCRIPTION** registers a callback for every push on an action.
//!
//! # Usage
//!
//! ```ignore
//! use duplex_mux::{ActionOptions, Channel, ChannelConfig, MemoryTransport};
//!
//! let transport = Arc::new(MemoryTransport::new());
//! let channel = Channel::open(transport, ChannelConfig::default())?;
//!
//! let ticket: Response<Ticket> = channel.get(ActionOptions::new("ticket.fetch"))?.await?;
//! let sub = channel.subscribe(ActionOptions::new("ticket.updated"), |push| {
//!     println!("{}", push.data);
//! })?;
//! sub.cancel();
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod channel;
pub mod dispatcher;
pub mod domain;
pub mod ports;
pub mod registry;

pub use adapters::{MemoryTransport, SequentialIdGenerator, UuidIdGenerator};
pub use channel::{
    Channel, EmitHandle, ListenOptions, Listening, PendingResponse, PushStream, Registration,
    SubscriptionHandle,
};
pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason};
pub use domain::{
    ActionOptions, CancelScope, ChannelConfig, ConfigError, MuxError, MuxResult, RequestEnvelope,
    RequestId, RequestOptions, Response, ResponseEnvelope, Verb, DEFAULT_EVENT_NAME,
};
pub use ports::{IdGenerator, InboundHandler, Transport, TransportError};
pub use registry::{
    Listener, PushCallback, Registry, RegistryStats, ResponseCallback, ResponseHandlers,
    StatsSnapshot, SubscriberId,
};
