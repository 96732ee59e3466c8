//! Control packets: PING/PONG liveness, FORWARD relay and DEBUG text.
//!
//! ```text
//! +------------+-------------+-----------------+
//! | command:u8 | node_id:u16 | data[16]        |
//! +------------+-------------+-----------------+
//! ```

use crate::WireError;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Size of the command payload
pub const CONTROL_DATA_SIZE: usize = 16;
/// Size of a control packet on the wire
pub const CONTROL_PACKET_SIZE: usize = 3 + CONTROL_DATA_SIZE;

/// Control commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Relay toward the next hop; `data[0]` carries the hop count
    Forward = 10,
    /// Application debug text
    Debug = 11,
    /// Liveness request
    Ping = 12,
    /// Liveness reply
    Pong = 13,
}

impl TryFrom<u8> for Command {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(Command::Forward),
            11 => Ok(Command::Debug),
            12 => Ok(Command::Ping),
            13 => Ok(Command::Pong),
            _ => Err(WireError::Command(value)),
        }
    }
}

/// Control packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPacket {
    /// Command
    pub command: Command,
    /// Sending node
    pub node_id: u16,
    /// Command-specific payload
    pub data: [u8; CONTROL_DATA_SIZE],
}

impl ControlPacket {
    /// Create a control packet with a zeroed payload
    pub fn new(command: Command, node_id: u16) -> Self {
        Self {
            command,
            node_id,
            data: [0; CONTROL_DATA_SIZE],
        }
    }

    /// Copy `data` into the payload, truncating past 16 bytes
    pub fn with_data(mut self, data: &[u8]) -> Self {
        let n = data.len().min(CONTROL_DATA_SIZE);
        self.data = [0; CONTROL_DATA_SIZE];
        self.data[..n].copy_from_slice(&data[..n]);
        self
    }

    /// DEBUG payload as text, up to the first NUL
    pub fn text(&self) -> String {
        let end = self
            .data
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(CONTROL_DATA_SIZE);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    /// Hop count of a FORWARD packet
    pub fn forward_hops(&self) -> u8 {
        self.data[0]
    }

    /// Set the hop count of a FORWARD packet
    pub fn set_forward_hops(&mut self, hops: u8) {
        self.data[0] = hops;
    }

    /// Encode to bytes (big-endian)
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(CONTROL_PACKET_SIZE);
        buf.put_u8(self.command as u8);
        buf.put_u16(self.node_id);
        buf.put_slice(&self.data);
    }

    /// Decode from exactly [`CONTROL_PACKET_SIZE`] bytes
    pub fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != CONTROL_PACKET_SIZE {
            return Err(WireError::Length {
                expected: CONTROL_PACKET_SIZE,
                actual: buf.len(),
            });
        }

        let command = Command::try_from(buf.get_u8())?;
        let node_id = buf.get_u16();
        let mut data = [0; CONTROL_DATA_SIZE];
        buf.copy_to_slice(&mut data);

        Ok(Self {
            command,
            node_id,
            data,
        })
    }
}
