//! Active Message envelope used by the host radio.
//!
//! On a mote the radio stack owns this header; on the host it travels as the
//! first six bytes of every datagram so the receiver learns the sender address
//! and which decoder the payload belongs to.
//!
//! ```text
//! +---------+---------+----------+--------+-----------------+
//! | dest:u16| src:u16 | am_type  | len:u8 | payload[len]    |
//! +---------+---------+----------+--------+-----------------+
//! ```

use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// AM type for telemetry packets
pub const AM_TELEMETRY: u8 = 0x96;
/// AM type for control packets
pub const AM_CONTROL: u8 = 0x97;
/// Broadcast destination address
pub const AM_BROADCAST: u16 = 0xFFFF;
/// AM header size in bytes
pub const AM_HEADER_SIZE: usize = 6;
/// Largest payload the radio carries in one message
pub const MAX_PAYLOAD: usize = 28;

/// Logical channel a packet travels on
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Sensor readings
    Telemetry = AM_TELEMETRY,
    /// PING/PONG, FORWARD and DEBUG commands
    Control = AM_CONTROL,
}

impl TryFrom<u8> for Channel {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            AM_TELEMETRY => Ok(Channel::Telemetry),
            AM_CONTROL => Ok(Channel::Control),
            _ => Err(WireError::AmType(value)),
        }
    }
}

/// AM header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmHeader {
    /// Destination address
    pub dest: u16,
    /// Source address
    pub src: u16,
    /// Logical channel
    pub channel: Channel,
    /// Payload length
    pub len: u8,
}

/// One radio message: header plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmFrame {
    /// Header
    pub header: AmHeader,
    /// Encoded packet
    pub payload: Bytes,
}

impl AmFrame {
    /// Wrap an encoded packet for transmission
    pub fn new(dest: u16, src: u16, channel: Channel, payload: Bytes) -> Result<Self, WireError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(WireError::Size(payload.len()));
        }

        Ok(Self {
            header: AmHeader {
                dest,
                src,
                channel,
                len: payload.len() as u8,
            },
            payload,
        })
    }

    /// Whether a node with `addr` should accept this frame
    pub fn is_for(&self, addr: u16) -> bool {
        self.header.dest == addr || self.header.dest == AM_BROADCAST
    }

    /// Encode header and payload (big-endian)
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(AM_HEADER_SIZE + self.payload.len());
        buf.put_u16(self.header.dest);
        buf.put_u16(self.header.src);
        buf.put_u8(self.header.channel as u8);
        buf.put_u8(self.header.len);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode one frame from a datagram
    pub fn decode(mut buf: Bytes) -> Result<Self, WireError> {
        if buf.len() < AM_HEADER_SIZE {
            return Err(WireError::Incomplete);
        }

        let dest = buf.get_u16();
        let src = buf.get_u16();
        let channel = Channel::try_from(buf.get_u8())?;
        let len = buf.get_u8();

        if buf.len() != len as usize {
            return Err(WireError::Length {
                expected: len as usize,
                actual: buf.len(),
            });
        }

        Ok(Self {
            header: AmHeader {
                dest,
                src,
                channel,
                len,
            },
            payload: buf,
        })
    }
}
