//! Ports (hexagonal boundary) for the channel multiplexer.

pub mod outbound;

pub use outbound::{IdGenerator, InboundHandler, Transport, TransportError};
