//! Packet codec and AM framing for mote telemetry.
//!
//! This crate provides the data-layout contract shared by every mote in a
//! network: fixed-width telemetry and control packets, the reading-type and
//! command enumerations, and the AM envelope the host radio wraps them in.
//!
//! ## Wire Format
//!
//! All multi-byte integers are big-endian so motes with different native
//! byte orders interoperate.
//!
//! ```text
//! Telemetry (AM 0x96):  node_id:u16 | group_id:u8 | hop_count:u8 | reading_flag:u8 | readings[N]:u16
//! Control   (AM 0x97):  command:u8 | node_id:u16 | data[16]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod am;
pub mod codec;
pub mod control;
pub mod error;
pub mod telemetry;

// Re-export main types
pub use am::{
    AmFrame, AmHeader, Channel, AM_BROADCAST, AM_CONTROL, AM_HEADER_SIZE, AM_TELEMETRY,
    MAX_PAYLOAD,
};
pub use codec::{Packet, WireLayout};
pub use control::{Command, ControlPacket, CONTROL_DATA_SIZE, CONTROL_PACKET_SIZE};
pub use error::WireError;
pub use telemetry::{
    ReadingFlag, Readings, TelemetryPacket, FLAG_STEP, LOWER_FLAG, MAX_READINGS,
    TELEMETRY_HEADER_SIZE, UPPER_FLAG,
};
