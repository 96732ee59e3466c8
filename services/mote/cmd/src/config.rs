//! Configuration handling for the mote node.
//!
//! Every network parameter must be given explicitly in the YAML file; the
//! firmware headers this replaces disagreed on their defaults, so none are
//! assumed. Parameters only a forwarding mote uses live in the `forwarding`
//! section, which a basestation leaves out. A handful of environment
//! variables override the file so one file can drive several local nodes.

use anyhow::{bail, Context, Result};
use mote_forward::{EngineConfig, Role};
use mote_queue::MAX_CAPACITY;
use mote_wire::WireLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Mote node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Node ID (AM address) of this mote
    pub node_id: u16,
    /// Group this mote belongs to
    pub group_id: u8,
    /// Readings carried by each telemetry packet
    pub readings_per_packet: usize,
    /// UDP address standing in for the radio
    pub bind: SocketAddr,
    /// Node ID to UDP address of every mote in radio range
    #[serde(default)]
    pub neighbors: BTreeMap<u16, SocketAddr>,
    /// How often counters are logged
    #[serde(with = "duration", default = "default_stats_interval")]
    pub stats_interval: Duration,
    /// Origin and relay settings; absent on a basestation
    #[serde(default)]
    pub forwarding: Option<ForwardingConfig>,
}

/// Settings of a forwarding mote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardingConfig {
    /// Address queued packets are sent to (0 is the basestation)
    pub destination: u16,
    /// Origin or relay
    pub role: Role,
    /// Forwarding queue capacity
    pub queue_capacity: usize,
    /// Highest hop count a relayed packet may reach
    pub max_hops: u8,
    /// Time between sample ticks
    #[serde(with = "duration")]
    pub sample_period: Duration,
    /// Time between transmit opportunities
    #[serde(with = "duration")]
    pub transmit_period: Duration,
    /// Periodic liveness ping
    #[serde(default)]
    pub ping: Option<PingConfig>,
}

/// Periodic PING settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PingConfig {
    /// Node to ping
    pub target: u16,
    /// Time between pings
    #[serde(with = "duration")]
    pub interval: Duration,
}

fn default_stats_interval() -> Duration {
    Duration::from_secs(30)
}

impl NodeConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;

        let mut config: NodeConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        info!("Loaded configuration from {:?}", path);

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        match &config.forwarding {
            Some(forwarding) => info!(
                "Final mote configuration: node_id={}, group_id={}, role={}, destination={}, bind={}",
                config.node_id, config.group_id, forwarding.role, forwarding.destination, config.bind
            ),
            None => info!(
                "Final mote configuration: node_id={}, group_id={}, no forwarding, bind={}",
                config.node_id, config.group_id, config.bind
            ),
        }

        Ok(config)
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MOTE_NODE_ID") {
            self.node_id = value.parse().context("MOTE_NODE_ID")?;
            info!("Node ID overridden by environment: {}", self.node_id);
        }

        if let Some(value) = lookup("MOTE_GROUP_ID") {
            self.group_id = value.parse().context("MOTE_GROUP_ID")?;
            info!("Group ID overridden by environment: {}", self.group_id);
        }

        if let Some(value) = lookup("MOTE_DESTINATION") {
            let Some(forwarding) = self.forwarding.as_mut() else {
                bail!("MOTE_DESTINATION is set but the config has no forwarding section");
            };
            forwarding.destination = value.parse().context("MOTE_DESTINATION")?;
            info!("Destination overridden by environment: {}", forwarding.destination);
        }

        if let Some(value) = lookup("MOTE_BIND") {
            self.bind = value.parse().context("MOTE_BIND")?;
            info!("Bind address overridden by environment: {}", self.bind);
        }

        Ok(())
    }

    /// Reject values the node cannot run with
    pub fn validate(&self) -> Result<()> {
        self.layout()?;
        if let Some(forwarding) = &self.forwarding {
            forwarding.validate()?;
        }
        Ok(())
    }

    /// Packet geometry
    pub fn layout(&self) -> Result<WireLayout> {
        WireLayout::new(self.readings_per_packet).context("readings_per_packet")
    }

    /// Forwarding settings, required for every role but the basestation
    pub fn forwarding(&self) -> Result<&ForwardingConfig> {
        self.forwarding
            .as_ref()
            .context("config has no forwarding section; only a basestation may omit it")
    }

    /// Settings for the forwarding engine
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let forwarding = self.forwarding()?;
        Ok(EngineConfig {
            node_id: self.node_id,
            group_id: self.group_id,
            next_hop: forwarding.destination,
            role: forwarding.role,
            max_hops: forwarding.max_hops,
            queue_capacity: forwarding.queue_capacity,
            layout: self.layout()?,
        })
    }
}

impl ForwardingConfig {
    fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 || self.queue_capacity > MAX_CAPACITY {
            bail!(
                "queue_capacity must be between 1 and {}, got {}",
                MAX_CAPACITY,
                self.queue_capacity
            );
        }
        if self.max_hops == 0 {
            bail!("max_hops must be at least 1");
        }
        if self.sample_period.is_zero() || self.transmit_period.is_zero() {
            bail!("sample_period and transmit_period must be non-zero");
        }
        if let Some(ping) = &self.ping {
            if ping.interval.is_zero() {
                bail!("ping interval must be non-zero");
            }
        }
        Ok(())
    }
}

/// humantime (de)serialization for durations, e.g. `250ms` or `30s`
mod duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
