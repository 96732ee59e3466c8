//! Keepalive protocol with PING/PONG and RTT measurement.
//!
//! A PING carries a correlation id in the first eight bytes of its payload;
//! the PONG echoes the payload unchanged so the pinger can compute the round
//! trip from its own clock.

use mote_wire::{Command, ControlPacket};
use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

static START: Lazy<Instant> = Lazy::new(Instant::now);

/// Build a PING control packet with correlation ID for RTT measurement
pub fn build_ping(my_node: u16, corr_id: u64) -> ControlPacket {
    ControlPacket::new(Command::Ping, my_node).with_data(&corr_id.to_be_bytes())
}

/// Build a PONG in response to a PING, echoing its payload
pub fn build_pong(my_node: u16, ping: &ControlPacket) -> ControlPacket {
    ControlPacket {
        command: Command::Pong,
        node_id: my_node,
        data: ping.data,
    }
}

/// Correlation ID carried by a PING or PONG
pub fn corr_id(packet: &ControlPacket) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&packet.data[..8]);
    u64::from_be_bytes(raw)
}

/// Generate a correlation ID based on monotonic time
pub fn now_corr_id() -> u64 {
    START.elapsed().as_nanos() as u64
}

/// Calculate RTT from a correlation ID in a PONG response
pub fn calc_rtt_from_corr(peer_corr_id: u64) -> Option<Duration> {
    let now_ns = now_corr_id();
    // clock skew or a foreign id
    now_ns.checked_sub(peer_corr_id).map(Duration::from_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_pong_packets() {
        let ping = build_ping(7, 0x0102_0304_0506_0708);
        assert_eq!(ping.command, Command::Ping);
        assert_eq!(ping.node_id, 7);
        assert_eq!(&ping.data[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(corr_id(&ping), 0x0102_0304_0506_0708);

        let pong = build_pong(3, &ping);
        assert_eq!(pong.command, Command::Pong);
        assert_eq!(pong.node_id, 3);
        assert_eq!(pong.data, ping.data);
        assert_eq!(corr_id(&pong), corr_id(&ping));
    }

    #[test]
    fn test_corr_id_generation() {
        let id1 = now_corr_id();
        std::thread::sleep(Duration::from_millis(1));
        let id2 = now_corr_id();

        assert!(id2 > id1, "Correlation IDs should be monotonically increasing");
    }

    #[test]
    fn test_rtt_calculation() {
        let start_corr = now_corr_id();
        std::thread::sleep(Duration::from_millis(10));

        let rtt = calc_rtt_from_corr(start_corr).unwrap();
        assert!(rtt >= Duration::from_millis(10));

        assert_eq!(calc_rtt_from_corr(u64::MAX), None);
    }
}
