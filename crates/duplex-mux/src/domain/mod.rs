//! Domain types for the channel multiplexer.
//!
//! Wire envelopes, verbs, correlation ids, configuration and errors. No I/O.

pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod verb;

// Re-exports for convenience
pub use config::{CancelScope, ChannelConfig, ConfigError, DEFAULT_EVENT_NAME};
pub use correlation::RequestId;
pub use envelope::{ActionOptions, RequestEnvelope, RequestOptions, Response, ResponseEnvelope};
pub use error::{MuxError, MuxResult};
pub use verb::Verb;
