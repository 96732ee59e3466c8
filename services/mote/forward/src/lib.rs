//! Store-and-forward engine for mote telemetry.
//!
//! This crate turns the packet formats in `mote-wire` into a best-effort,
//! at-most-once delivery network with bounded hop count:
//!
//! - **Multiplexer**: rotates the sensor type sampled on each tick
//! - **Engine**: origin nodes queue their own readings, relay nodes queue
//!   inbound readings with the hop count bumped, and every node answers PING
//!   with PONG straight from the receive path
//! - **Keepalive**: PING/PONG packets with correlation IDs for RTT
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use mote_forward::{Disposition, EngineConfig, ForwardingEngine, Radio, Role, Sampler};
//! use mote_wire::{Channel, ReadingFlag, WireLayout};
//!
//! struct Adc;
//! impl Sampler for Adc {
//!     fn sample(&mut self, _flag: ReadingFlag) -> u16 {
//!         312
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Air(Vec<(u16, Channel, Bytes)>);
//! impl Radio for Air {
//!     fn send(&mut self, dest: u16, channel: Channel, frame: Bytes) {
//!         self.0.push((dest, channel, frame));
//!     }
//! }
//!
//! let config = EngineConfig {
//!     node_id: 7,
//!     group_id: 0,
//!     next_hop: 0,
//!     role: Role::Origin,
//!     max_hops: 4,
//!     queue_capacity: 128,
//!     layout: WireLayout::new(1)?,
//! };
//!
//! let mut engine = ForwardingEngine::new(config, Adc, Air::default())?;
//! assert_eq!(engine.on_sample_tick(), Disposition::Enqueued);
//! assert_eq!(engine.on_transmit_opportunity(), Disposition::Transmitted);
//! assert_eq!(&engine.radio().0[0].2[..], &[0u8, 7, 0, 0, 0, 0x01, 0x38]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod keepalive;
pub mod multiplexer;
pub mod platform;
pub mod stats;

// Re-export main types
pub use config::{EngineConfig, Role};
pub use engine::{Disposition, ForwardingEngine};
pub use error::{ConfigError, DropReason, ForwardError};
pub use keepalive::{build_ping, build_pong, calc_rtt_from_corr, now_corr_id};
pub use multiplexer::{next_flag, ReadingCycle};
pub use platform::{Radio, Sampler};
pub use stats::EngineStats;
