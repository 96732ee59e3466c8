//! Bounded FIFO forwarding queue for motes.
//!
//! Packets waiting for a transmit opportunity sit here. The queue never grows
//! past the capacity fixed at construction: when it is full the newest packet
//! is refused and the existing contents are left untouched.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod queue;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use queue::ForwardingQueue;

/// Default number of queued packets
pub const DEFAULT_CAPACITY: u8 = 128;

/// Largest capacity an 8-bit size counter can track without reaching 256
pub const MAX_CAPACITY: usize = u8::MAX as usize;

/// Queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Queue is at capacity; the packet was not stored
    #[error("queue full ({capacity} entries)")]
    Full {
        /// Configured capacity
        capacity: u8,
    },
    /// Requested capacity is zero or above [`MAX_CAPACITY`]
    #[error("invalid queue capacity: {0}")]
    Capacity(usize),
}

/// Queue counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Packets accepted
    pub enqueued: u64,
    /// Packets handed out
    pub dequeued: u64,
    /// Packets refused because the queue was full
    pub rejected: u64,
    /// Largest depth observed
    pub high_water: u8,
}
