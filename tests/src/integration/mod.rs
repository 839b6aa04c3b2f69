//! End-to-end scenarios against a task-backed peer.
