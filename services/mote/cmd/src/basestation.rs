//! Basestation sink.
//!
//! The basestation terminates forwarding: it never queues anything, it turns
//! each telemetry packet into one JSON record per reading and answers PINGs so
//! relays can measure round trips to it. It can stop on its own after a fixed
//! number of telemetry packets.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mote_forward::{build_pong, DropReason, Radio};
use mote_wire::{Channel, Command, Packet, ReadingFlag, TelemetryPacket, WireLayout};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info};

/// Reference voltage of the Telos ADC
const ADC_VREF: f64 = 1.5;
/// Counts of the 12-bit ADC
const ADC_COUNTS: f64 = 4096.0;

/// Convert a raw Telos sample to physical units.
///
/// Temperature in °C, humidity in %RH, light in lux and voltage in volts.
pub fn convert(flag: ReadingFlag, raw: u16) -> f64 {
    let raw = raw as f64;
    match flag {
        // SHT11, 14-bit at 3 V
        ReadingFlag::Temperature => -39.6 + 0.01 * raw,
        // SHT11, 12-bit
        ReadingFlag::Humidity => -2.0468 + 0.0367 * raw - 1.5955e-6 * raw * raw,
        ReadingFlag::Visible => 0.625e6 * photodiode_current(raw) * 1000.0,
        ReadingFlag::Infrared => 0.769e5 * photodiode_current(raw) * 1000.0,
        // VCC/2 against the 1.5 V reference
        ReadingFlag::Voltage => raw / ADC_COUNTS * 2.0 * ADC_VREF,
    }
}

/// Photodiode current across the 100 kΩ sense resistor
fn photodiode_current(raw: f64) -> f64 {
    raw / ADC_COUNTS * ADC_VREF / 100_000.0
}

/// One converted reading as emitted on stdout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingRecord {
    /// Originating mote
    pub sensorid: u16,
    /// Group of the originating mote
    pub groupid: u8,
    /// Reading type as carried on the wire
    pub rtypeid: u8,
    /// Reading type name
    pub rtype: &'static str,
    /// Relays the packet went through
    pub hops: u8,
    /// Receive time in seconds since the Unix epoch
    pub ts: f64,
    /// Converted value
    pub val: f64,
}

impl ReadingRecord {
    /// Records for every reading in a packet
    pub fn from_packet(packet: &TelemetryPacket, received_at: DateTime<Utc>) -> Vec<Self> {
        let ts = received_at.timestamp_millis() as f64 / 1000.0;
        packet
            .readings
            .iter()
            .map(|&raw| ReadingRecord {
                sensorid: packet.node_id,
                groupid: packet.group_id,
                rtypeid: packet.reading_flag as u8,
                rtype: packet.reading_flag.name(),
                hops: packet.hop_count,
                ts,
                val: convert(packet.reading_flag, raw),
            })
            .collect()
    }
}

/// Basestation counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Telemetry packets accepted, per originating mote
    pub packets_by_origin: BTreeMap<u16, u64>,
    /// Records written
    pub records: u64,
    /// PINGs answered
    pub pings_answered: u64,
    /// Packets dropped for format or group
    pub dropped: u64,
}

/// Sink for telemetry arriving at the basestation
#[derive(Debug)]
pub struct Basestation<R> {
    node_id: u16,
    group_id: u8,
    layout: WireLayout,
    radio: R,
    packet_limit: Option<u64>,
    stats: SinkStats,
}

impl<R: Radio> Basestation<R> {
    pub fn new(node_id: u16, group_id: u8, layout: WireLayout, radio: R) -> Self {
        info!(
            "Basestation {} listening for group {} ({} readings per packet)",
            node_id,
            group_id,
            layout.readings_per_packet()
        );
        Self {
            node_id,
            group_id,
            layout,
            radio,
            packet_limit: None,
            stats: SinkStats::default(),
        }
    }

    /// Stop after `limit` accepted telemetry packets
    pub fn with_packet_limit(mut self, limit: Option<u64>) -> Self {
        self.packet_limit = limit;
        self
    }

    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }

    #[cfg(test)]
    fn radio(&self) -> &R {
        &self.radio
    }

    /// Telemetry packets accepted from every origin
    pub fn packets(&self) -> u64 {
        self.stats.packets_by_origin.values().sum()
    }

    /// Whether the packet limit has been reached
    pub fn is_done(&self) -> bool {
        self.packet_limit
            .is_some_and(|limit| self.packets() >= limit)
    }

    /// Handle one received packet, writing a JSON line per reading to `out`.
    ///
    /// Returns the records written. Only output errors fail.
    pub fn handle<W: Write>(
        &mut self,
        src: u16,
        channel: Channel,
        bytes: &[u8],
        received_at: DateTime<Utc>,
        out: &mut W,
    ) -> Result<Vec<ReadingRecord>> {
        let packet = match self.layout.decode(channel, bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.drop_packet(DropReason::Format, src, &e);
                return Ok(Vec::new());
            }
        };

        match packet {
            Packet::Telemetry(telemetry) => self.record(&telemetry, received_at, out),
            Packet::Control(control) if control.command == Command::Ping => {
                let pong = Packet::Control(build_pong(self.node_id, &control));
                self.radio.send(src, pong.channel(), pong.encode());
                self.stats.pings_answered += 1;
                debug!("answered ping from node {}", src);
                Ok(Vec::new())
            }
            Packet::Control(control) => {
                debug!("ignoring {:?} from node {}", control.command, src);
                Ok(Vec::new())
            }
        }
    }

    fn record<W: Write>(
        &mut self,
        packet: &TelemetryPacket,
        received_at: DateTime<Utc>,
        out: &mut W,
    ) -> Result<Vec<ReadingRecord>> {
        if packet.group_id != self.group_id {
            let reason = format!("group {} != {}", packet.group_id, self.group_id);
            self.drop_packet(DropReason::GroupMismatch, packet.node_id, &reason);
            return Ok(Vec::new());
        }

        let records = ReadingRecord::from_packet(packet, received_at);
        for record in &records {
            serde_json::to_writer(&mut *out, record).context("failed to encode reading")?;
            out.write_all(b"\n").context("failed to write reading")?;
        }
        out.flush().context("failed to flush readings")?;

        *self.stats.packets_by_origin.entry(packet.node_id).or_default() += 1;
        self.stats.records += records.len() as u64;
        Ok(records)
    }

    fn drop_packet(&mut self, reason: DropReason, from: u16, detail: &dyn std::fmt::Display) {
        self.stats.dropped += 1;
        debug!("dropped packet from node {} ({}): {}", from, reason, detail);
    }
}
