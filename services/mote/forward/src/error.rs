//! Per-packet failure taxonomy.

use mote_queue::QueueError;
use mote_wire::WireError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a packet could not be handled.
///
/// The engine never hands these to its caller: each one is logged, counted
/// and turned into [`DropReason`] at the point it is detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    /// Bytes could not be decoded
    #[error("format error: {0}")]
    Format(#[from] WireError),

    /// Forwarding queue refused the packet
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Packet belongs to another partition
    #[error("group mismatch: expected {expected}, got {actual}")]
    GroupMismatch {
        /// Our group
        expected: u8,
        /// Packet's group
        actual: u8,
    },

    /// One more hop would exceed the configured limit
    #[error("hop limit exceeded: {hops} hops already, max {max}")]
    HopLimitExceeded {
        /// Hops taken before this relay
        hops: u8,
        /// Configured maximum
        max: u8,
    },
}

/// Engine configuration rejected at construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A hop limit of zero would drop every relayed packet
    #[error("max_hops must be at least 1")]
    ZeroMaxHops,

    /// Queued packets would be sent back to ourselves
    #[error("next hop {0} is the node itself")]
    SelfNextHop(u16),

    /// Queue capacity out of range
    #[error("queue: {0}")]
    Queue(#[from] QueueError),
}

impl ForwardError {
    /// Drop category for stats and dispositions
    pub fn reason(&self) -> DropReason {
        match self {
            ForwardError::Format(_) => DropReason::Format,
            ForwardError::Queue(_) => DropReason::QueueFull,
            ForwardError::GroupMismatch { .. } => DropReason::GroupMismatch,
            ForwardError::HopLimitExceeded { .. } => DropReason::HopLimitExceeded,
        }
    }
}

/// Reason for dropping a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Undecodable bytes
    Format,
    /// Cross-group packet
    GroupMismatch,
    /// Forwarding loop guard
    HopLimitExceeded,
    /// No room in the forwarding queue
    QueueFull,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Format => write!(f, "format error"),
            DropReason::GroupMismatch => write!(f, "group mismatch"),
            DropReason::HopLimitExceeded => write!(f, "hop limit exceeded"),
            DropReason::QueueFull => write!(f, "queue full"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_packet_error_maps_to_a_drop_reason() {
        assert_eq!(
            ForwardError::from(WireError::Incomplete).reason(),
            DropReason::Format
        );
        assert_eq!(
            ForwardError::from(QueueError::Full { capacity: 1 }).reason(),
            DropReason::QueueFull
        );
        assert_eq!(
            ForwardError::GroupMismatch { expected: 0, actual: 1 }.reason(),
            DropReason::GroupMismatch
        );
        assert_eq!(
            ForwardError::HopLimitExceeded { hops: 4, max: 4 }.reason(),
            DropReason::HopLimitExceeded
        );
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(ConfigError::ZeroMaxHops.to_string(), "max_hops must be at least 1");
        assert_eq!(ConfigError::SelfNextHop(7).to_string(), "next hop 7 is the node itself");
        assert!(matches!(
            ConfigError::from(QueueError::Capacity(0)),
            ConfigError::Queue(QueueError::Capacity(0))
        ));
    }
}
