//! Telemetry packets carrying typed sensor readings.
//!
//! ```text
//! +-------------+-------------+-------------+--------------+-------------------+
//! | node_id:u16 | group_id:u8 | hop_count:u8| reading_flag | readings[N]:u16xN |
//! +-------------+-------------+-------------+--------------+-------------------+
//! ```

use crate::WireError;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Bytes ahead of the readings
pub const TELEMETRY_HEADER_SIZE: usize = 5;

/// Most readings that fit in one radio payload alongside the header
pub const MAX_READINGS: usize = (crate::am::MAX_PAYLOAD - TELEMETRY_HEADER_SIZE) / 2;

/// First flag in the rotation
pub const LOWER_FLAG: u8 = 0;
/// Last flag in the rotation
pub const UPPER_FLAG: u8 = 40;
/// Spacing between adjacent flags
pub const FLAG_STEP: u8 = 10;

/// Inline reading storage; never spills to the heap for a valid layout
pub type Readings = SmallVec<[u16; MAX_READINGS]>;

/// Sensor type carried by a telemetry packet.
///
/// Values are spaced by [`FLAG_STEP`] so a new type can slot in between two
/// existing ones without renumbering.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingFlag {
    /// Ambient temperature
    Temperature = 0,
    /// Relative humidity
    Humidity = 10,
    /// Photosynthetically active (visible) light
    Visible = 20,
    /// Total solar (infrared) light
    Infrared = 30,
    /// Supply voltage
    Voltage = 40,
}

impl ReadingFlag {
    /// Every flag in rotation order
    pub const ALL: [ReadingFlag; 5] = [
        ReadingFlag::Temperature,
        ReadingFlag::Humidity,
        ReadingFlag::Visible,
        ReadingFlag::Infrared,
        ReadingFlag::Voltage,
    ];

    /// Short lowercase name
    pub fn name(self) -> &'static str {
        match self {
            ReadingFlag::Temperature => "temperature",
            ReadingFlag::Humidity => "humidity",
            ReadingFlag::Visible => "visible",
            ReadingFlag::Infrared => "infrared",
            ReadingFlag::Voltage => "voltage",
        }
    }
}

impl TryFrom<u8> for ReadingFlag {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ReadingFlag::Temperature),
            10 => Ok(ReadingFlag::Humidity),
            20 => Ok(ReadingFlag::Visible),
            30 => Ok(ReadingFlag::Infrared),
            40 => Ok(ReadingFlag::Voltage),
            _ => Err(WireError::Flag(value)),
        }
    }
}

/// One batch of readings in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    /// Originating node
    pub node_id: u16,
    /// Network partition of the origin
    pub group_id: u8,
    /// Relay traversals so far
    pub hop_count: u8,
    /// Sensor type of every reading
    pub reading_flag: ReadingFlag,
    /// Raw samples
    pub readings: Readings,
}

impl TelemetryPacket {
    /// Create a packet at its origin (hop count 0)
    pub fn new<I>(node_id: u16, group_id: u8, reading_flag: ReadingFlag, readings: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        Self {
            node_id,
            group_id,
            hop_count: 0,
            reading_flag,
            readings: readings.into_iter().collect(),
        }
    }

    /// Size of this packet on the wire
    pub fn encoded_len(&self) -> usize {
        TELEMETRY_HEADER_SIZE + 2 * self.readings.len()
    }

    /// Encode to bytes (big-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u16(self.node_id);
        buf.put_u8(self.group_id);
        buf.put_u8(self.hop_count);
        buf.put_u8(self.reading_flag as u8);
        for reading in &self.readings {
            buf.put_u16(*reading);
        }
    }

    /// Decode a packet holding exactly `readings` samples
    pub fn decode(mut buf: &[u8], readings: usize) -> Result<Self, WireError> {
        let expected = TELEMETRY_HEADER_SIZE + 2 * readings;
        if buf.len() != expected {
            return Err(WireError::Length {
                expected,
                actual: buf.len(),
            });
        }

        let node_id = buf.get_u16();
        let group_id = buf.get_u8();
        let hop_count = buf.get_u8();
        let reading_flag = ReadingFlag::try_from(buf.get_u8())?;
        let readings = (0..readings).map(|_| buf.get_u16()).collect();

        Ok(Self {
            node_id,
            group_id,
            hop_count,
            reading_flag,
            readings,
        })
    }
}
