//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors.
///
/// Any of these raised while decoding inbound bytes is a format error: the
/// receiver drops the packet and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Incomplete frame (need more data)
    #[error("incomplete frame")]
    Incomplete,

    /// Buffer length does not match the fixed packet length
    #[error("length mismatch: expected {expected}, got {actual}")]
    Length {
        /// Length the layout requires
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Payload exceeds the radio MTU
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Unknown control command
    #[error("unknown command {0}")]
    Command(u8),

    /// Unknown reading flag
    #[error("unknown reading flag {0}")]
    Flag(u8),

    /// Unknown AM type
    #[error("unknown am type {0:#04x}")]
    AmType(u8),

    /// Readings-per-packet outside what fits in one radio payload
    #[error("readings per packet out of range: {0}")]
    Readings(usize),
}
