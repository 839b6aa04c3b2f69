//! Request id generators.

use crate::domain::correlation::RequestId;
use crate::ports::IdGenerator;
use std::sync::atomic::{AtomicU64, Ordering};

/// Random UUID v4 ids. The default generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> RequestId {
        RequestId::generate()
    }
}

/// Deterministic `<prefix>-<n>` ids, starting at 1.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("req")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId::new(format!("{}-{}", self.prefix, n))
    }
}
