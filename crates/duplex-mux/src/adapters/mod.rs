//! Adapters implementing the outbound ports.

pub mod ids;
pub mod memory;

pub use ids::{SequentialIdGenerator, UuidIdGenerator};
pub use memory::MemoryTransport;
