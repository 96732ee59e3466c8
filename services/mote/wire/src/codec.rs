//! Packet codec: fixed-length encode/decode selected by logical channel.

use crate::am::{Channel, MAX_PAYLOAD};
use crate::control::{ControlPacket, CONTROL_PACKET_SIZE};
use crate::telemetry::{ReadingFlag, TelemetryPacket, MAX_READINGS, TELEMETRY_HEADER_SIZE};
use crate::WireError;
use bytes::{Bytes, BytesMut};

/// Any packet the engine handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Sensor readings
    Telemetry(TelemetryPacket),
    /// Control command
    Control(ControlPacket),
}

impl Packet {
    /// Channel this packet travels on
    pub fn channel(&self) -> Channel {
        match self {
            Packet::Telemetry(_) => Channel::Telemetry,
            Packet::Control(_) => Channel::Control,
        }
    }

    /// Encode to a contiguous buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Packet::Telemetry(t) => t.encode(&mut buf),
            Packet::Control(c) => c.encode(&mut buf),
        }
        buf.freeze()
    }
}

impl From<TelemetryPacket> for Packet {
    fn from(packet: TelemetryPacket) -> Self {
        Packet::Telemetry(packet)
    }
}

impl From<ControlPacket> for Packet {
    fn from(packet: ControlPacket) -> Self {
        Packet::Control(packet)
    }
}

/// Build-time packet geometry.
///
/// Every node in a network must share the same layout; telemetry length is
/// `5 + 2 * readings_per_packet` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLayout {
    readings_per_packet: usize,
}

impl WireLayout {
    /// Create a layout, rejecting batches that do not fit the radio payload
    pub fn new(readings_per_packet: usize) -> Result<Self, WireError> {
        if readings_per_packet == 0 || readings_per_packet > MAX_READINGS {
            return Err(WireError::Readings(readings_per_packet));
        }
        Ok(Self {
            readings_per_packet,
        })
    }

    /// Readings carried by each telemetry packet
    pub fn readings_per_packet(&self) -> usize {
        self.readings_per_packet
    }

    /// Fixed encoded length for a channel
    pub fn encoded_len(&self, channel: Channel) -> usize {
        match channel {
            Channel::Telemetry => TELEMETRY_HEADER_SIZE + 2 * self.readings_per_packet,
            Channel::Control => CONTROL_PACKET_SIZE,
        }
    }

    /// Build an origin packet, checking the batch size against the layout
    pub fn telemetry<I>(
        &self,
        node_id: u16,
        group_id: u8,
        reading_flag: ReadingFlag,
        readings: I,
    ) -> Result<TelemetryPacket, WireError>
    where
        I: IntoIterator<Item = u16>,
    {
        let packet = TelemetryPacket::new(node_id, group_id, reading_flag, readings);
        if packet.readings.len() != self.readings_per_packet {
            return Err(WireError::Readings(packet.readings.len()));
        }
        Ok(packet)
    }

    /// Encode a packet, checking it matches this layout
    pub fn encode(&self, packet: &Packet) -> Result<Bytes, WireError> {
        let bytes = packet.encode();
        let expected = self.encoded_len(packet.channel());
        if bytes.len() != expected {
            return Err(WireError::Length {
                expected,
                actual: bytes.len(),
            });
        }
        debug_assert!(bytes.len() <= MAX_PAYLOAD);
        Ok(bytes)
    }

    /// Decode bytes received on `channel`
    pub fn decode(&self, channel: Channel, bytes: &[u8]) -> Result<Packet, WireError> {
        match channel {
            Channel::Telemetry => {
                TelemetryPacket::decode(bytes, self.readings_per_packet).map(Packet::Telemetry)
            }
            Channel::Control => ControlPacket::decode(bytes).map(Packet::Control),
        }
    }
}
