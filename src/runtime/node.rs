//! Node trait for streaming processing
//!
//! Defines the ProcessNode trait that all streaming nodes implement.
//! Nodes own their channel endpoints; they are wired together with
//! [`channel`](super::channel) before being handed to the scheduler.

pub use super::errors::{WorkError, WorkResult};

/// A processing node driven by the scheduler
/// - Sources own senders only
/// - Sinks own receivers only
/// - Processors own both
pub trait ProcessNode: Send {
    /// Get a debug name for this node
    fn name(&self) -> &str;

    /// Check if this node should stop processing
    fn should_stop(&self) -> bool {
        false
    }

    /// Returns true if this node spawns its own worker threads and manages them internally.
    /// If true, the scheduler will call work() once to start the node, then wait for should_stop().
    /// If false (default), the scheduler will call work() repeatedly in a loop.
    fn is_self_threading(&self) -> bool {
        false
    }

    /// Do one unit of work: read inputs, process, write outputs.
    /// Returns Ok(n) where n is the number of items produced, or Err to stop
    /// (`WorkError::Shutdown` when the input is exhausted).
    fn work(&mut self) -> WorkResult<usize>;
}
