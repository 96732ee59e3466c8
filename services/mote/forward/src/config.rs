//! Engine configuration

use crate::ConfigError;
use mote_wire::WireLayout;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a node does with readings.
///
/// Chosen once at start-up; there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Samples its own sensors and queues the readings
    Origin,
    /// Queues inbound readings for the next hop
    Relay,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Origin => write!(f, "origin"),
            Role::Relay => write!(f, "relay"),
        }
    }
}

/// Forwarding engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Our node ID
    pub node_id: u16,
    /// Our group; packets from other groups are dropped
    pub group_id: u8,
    /// Address every queued packet is sent to (the basestation or the next relay)
    pub next_hop: u16,
    /// Origin or relay
    pub role: Role,
    /// Highest hop count a relayed packet may carry
    pub max_hops: u8,
    /// Forwarding queue capacity (1..=255)
    pub queue_capacity: usize,
    /// Packet geometry shared by the network
    pub layout: WireLayout,
}

impl EngineConfig {
    /// Check values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_hops == 0 {
            return Err(ConfigError::ZeroMaxHops);
        }
        if self.next_hop == self.node_id {
            return Err(ConfigError::SelfNextHop(self.next_hop));
        }
        Ok(())
    }
}
