//! Engine counters

use crate::DropReason;
use std::time::Duration;

/// Counters since the engine started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Telemetry packets built from local samples
    pub originated: u64,
    /// Inbound packets queued for the next hop
    pub relayed: u64,
    /// Packets handed to the radio from the queue
    pub transmitted: u64,
    /// PINGs we emitted
    pub pings_sent: u64,
    /// PINGs answered with a PONG
    pub pings_answered: u64,
    /// PONGs received
    pub pongs_received: u64,
    /// DEBUG packets received
    pub debug_received: u64,
    /// Telemetry an origin node saw and ignored
    pub ignored: u64,
    /// Drops due to undecodable bytes
    pub dropped_format: u64,
    /// Drops due to another group
    pub dropped_group: u64,
    /// Drops due to the hop limit
    pub dropped_hop_limit: u64,
    /// Drops due to a full queue
    pub dropped_queue_full: u64,
    /// Round trip of the latest PONG
    pub last_rtt: Option<Duration>,
}

impl EngineStats {
    /// Count one drop
    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Format => self.dropped_format += 1,
            DropReason::GroupMismatch => self.dropped_group += 1,
            DropReason::HopLimitExceeded => self.dropped_hop_limit += 1,
            DropReason::QueueFull => self.dropped_queue_full += 1,
        }
    }

    /// Drops of every kind
    pub fn dropped(&self) -> u64 {
        self.dropped_format + self.dropped_group + self.dropped_hop_limit + self.dropped_queue_full
    }
}
