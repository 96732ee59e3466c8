//! Forwarding engine: originate, relay and answer liveness pings.
//!
//! The engine is driven by three events, each run to completion before the
//! next: a sample tick, a received packet, and a transmit opportunity. Every
//! per-packet failure becomes a silent drop; callers only ever see a
//! [`Disposition`] describing what happened.

use crate::config::{EngineConfig, Role};
use crate::keepalive;
use crate::multiplexer::ReadingCycle;
use crate::platform::{Radio, Sampler};
use crate::stats::EngineStats;
use crate::{ConfigError, DropReason, ForwardError};
use mote_queue::ForwardingQueue;
use mote_wire::{Channel, Command, ControlPacket, Packet, Readings, TelemetryPacket};
use tracing::{debug, info, trace};

/// Outcome of one engine event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Packet placed in the forwarding queue
    Enqueued,
    /// Answered immediately, bypassing the queue
    Replied,
    /// Handled locally, nothing further to send
    Consumed,
    /// One queued packet handed to the radio
    Transmitted,
    /// Transmit opportunity with an empty queue
    Idle,
    /// Event does not apply to this node's role
    Ignored,
    /// Packet dropped
    Dropped(DropReason),
}

/// Queue-backed store-and-forward engine for one node
#[derive(Debug)]
pub struct ForwardingEngine<S, R> {
    config: EngineConfig,
    cycle: ReadingCycle,
    queue: ForwardingQueue<Packet>,
    sampler: S,
    radio: R,
    stats: EngineStats,
}

impl<S: Sampler, R: Radio> ForwardingEngine<S, R> {
    /// Create an engine; the queue storage is reserved here
    pub fn new(config: EngineConfig, sampler: S, radio: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = ForwardingQueue::with_capacity(config.queue_capacity)?;

        info!(
            "forwarding engine ready: node={} group={} role={} next_hop={} max_hops={} queue={}",
            config.node_id,
            config.group_id,
            config.role,
            config.next_hop,
            config.max_hops,
            config.queue_capacity
        );

        Ok(Self {
            config,
            cycle: ReadingCycle::default(),
            queue,
            sampler,
            radio,
            stats: EngineStats::default(),
        })
    }

    /// Configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forwarding queue
    pub fn queue(&self) -> &ForwardingQueue<Packet> {
        &self.queue
    }

    /// Counters
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Sampling primitive
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Transmit primitive
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Mutable transmit primitive
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Sample the current reading type and queue it (origin nodes only).
    ///
    /// The reading type advances once per tick whether or not the packet
    /// found room in the queue.
    pub fn on_sample_tick(&mut self) -> Disposition {
        if self.config.role != Role::Origin {
            return Disposition::Ignored;
        }

        let flag = self.cycle.tick();
        let count = self.config.layout.readings_per_packet();
        let readings: Readings = (0..count).map(|_| self.sampler.sample(flag)).collect();

        let packet = TelemetryPacket {
            node_id: self.config.node_id,
            group_id: self.config.group_id,
            hop_count: 0,
            reading_flag: flag,
            readings,
        };
        trace!("sampled {:?}", packet);

        match self.queue.enqueue(Packet::Telemetry(packet)) {
            Ok(()) => {
                self.stats.originated += 1;
                debug!(
                    "queued {} reading (depth={})",
                    flag.name(),
                    self.queue.len()
                );
                Disposition::Enqueued
            }
            Err(e) => self.drop_packet(e.into()),
        }
    }

    /// Handle bytes the radio delivered from `src` on `channel`
    pub fn on_packet_received(&mut self, src: u16, channel: Channel, bytes: &[u8]) -> Disposition {
        match self.handle_received(src, channel, bytes) {
            Ok(disposition) => disposition,
            Err(e) => self.drop_packet(e),
        }
    }

    /// Send the packet at the head of the queue to the next hop
    pub fn on_transmit_opportunity(&mut self) -> Disposition {
        let Some(packet) = self.queue.dequeue() else {
            return Disposition::Idle;
        };

        self.send_now(self.config.next_hop, &packet);
        self.stats.transmitted += 1;
        Disposition::Transmitted
    }

    /// Ping `dest` for liveness; returns the correlation id carried
    pub fn ping(&mut self, dest: u16) -> u64 {
        let corr_id = keepalive::now_corr_id();
        let ping = Packet::Control(keepalive::build_ping(self.config.node_id, corr_id));
        self.send_now(dest, &ping);
        self.stats.pings_sent += 1;
        debug!("sent ping to node {} (corr={})", dest, corr_id);
        corr_id
    }

    fn handle_received(
        &mut self,
        src: u16,
        channel: Channel,
        bytes: &[u8],
    ) -> Result<Disposition, ForwardError> {
        match self.config.layout.decode(channel, bytes)? {
            Packet::Telemetry(packet) => self.handle_telemetry(src, packet),
            Packet::Control(packet) => self.handle_control(src, packet),
        }
    }

    fn handle_telemetry(
        &mut self,
        src: u16,
        mut packet: TelemetryPacket,
    ) -> Result<Disposition, ForwardError> {
        if packet.group_id != self.config.group_id {
            return Err(ForwardError::GroupMismatch {
                expected: self.config.group_id,
                actual: packet.group_id,
            });
        }

        if self.config.role == Role::Origin {
            self.stats.ignored += 1;
            trace!("origin node ignoring telemetry from node {}", packet.node_id);
            return Ok(Disposition::Ignored);
        }

        packet.hop_count = self.next_hop_count(packet.hop_count)?;
        debug!(
            "relaying {} from node {} via {} (hops={})",
            packet.reading_flag.name(),
            packet.node_id,
            src,
            packet.hop_count
        );

        self.queue.enqueue(Packet::Telemetry(packet))?;
        self.stats.relayed += 1;
        Ok(Disposition::Enqueued)
    }

    fn handle_control(
        &mut self,
        src: u16,
        mut packet: ControlPacket,
    ) -> Result<Disposition, ForwardError> {
        match packet.command {
            Command::Ping => {
                let pong = Packet::Control(keepalive::build_pong(self.config.node_id, &packet));
                self.send_now(src, &pong);
                self.stats.pings_answered += 1;
                debug!("answered ping from node {}", src);
                Ok(Disposition::Replied)
            }
            Command::Pong => {
                let rtt = keepalive::calc_rtt_from_corr(keepalive::corr_id(&packet));
                self.stats.pongs_received += 1;
                self.stats.last_rtt = rtt;
                debug!("pong from node {} (rtt={:?})", packet.node_id, rtt);
                Ok(Disposition::Consumed)
            }
            Command::Forward => {
                let hops = self.next_hop_count(packet.forward_hops())?;
                packet.set_forward_hops(hops);
                self.queue.enqueue(Packet::Control(packet))?;
                self.stats.relayed += 1;
                Ok(Disposition::Enqueued)
            }
            Command::Debug => {
                self.stats.debug_received += 1;
                info!("debug from node {}: {}", packet.node_id, packet.text());
                Ok(Disposition::Consumed)
            }
        }
    }

    fn next_hop_count(&self, hops: u8) -> Result<u8, ForwardError> {
        match hops.checked_add(1) {
            Some(next) if next <= self.config.max_hops => Ok(next),
            _ => Err(ForwardError::HopLimitExceeded {
                hops,
                max: self.config.max_hops,
            }),
        }
    }

    fn send_now(&mut self, dest: u16, packet: &Packet) {
        let frame = packet.encode();
        trace!("tx {:?} to node {} ({} bytes)", packet.channel(), dest, frame.len());
        self.radio.send(dest, packet.channel(), frame);
    }

    fn drop_packet(&mut self, err: ForwardError) -> Disposition {
        let reason = err.reason();
        self.stats.record_drop(reason);
        debug!("dropping packet: {}", err);
        Disposition::Dropped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mote_wire::{ReadingFlag, WireLayout};

    #[derive(Debug, Default)]
    struct FixedSampler {
        calls: Vec<ReadingFlag>,
    }

    impl Sampler for FixedSampler {
        fn sample(&mut self, flag: ReadingFlag) -> u16 {
            self.calls.push(flag);
            312 + flag as u16
        }
    }

    #[derive(Debug, Default)]
    struct RecordingRadio {
        sent: Vec<(u16, Channel, Bytes)>,
    }

    impl Radio for RecordingRadio {
        fn send(&mut self, dest: u16, channel: Channel, frame: Bytes) {
            self.sent.push((dest, channel, frame));
        }
    }

    type TestEngine = ForwardingEngine<FixedSampler, RecordingRadio>;

    fn config(node_id: u16, role: Role, max_hops: u8) -> EngineConfig {
        EngineConfig {
            node_id,
            group_id: 0,
            next_hop: 0,
            role,
            max_hops,
            queue_capacity: 128,
            layout: WireLayout::new(1).unwrap(),
        }
    }

    fn engine(config: EngineConfig) -> TestEngine {
        ForwardingEngine::new(config, FixedSampler::default(), RecordingRadio::default()).unwrap()
    }

    fn telemetry_bytes(packet: &TelemetryPacket) -> Bytes {
        Packet::Telemetry(packet.clone()).encode()
    }

    fn queued_telemetry(engine: &TestEngine) -> Vec<TelemetryPacket> {
        engine
            .queue()
            .iter()
            .filter_map(|p| match p {
                Packet::Telemetry(t) => Some(t.clone()),
                Packet::Control(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut bad = config(7, Role::Origin, 4);
        bad.queue_capacity = 0;
        assert!(matches!(
            ForwardingEngine::new(bad, FixedSampler::default(), RecordingRadio::default()),
            Err(ConfigError::Queue(_))
        ));

        let bad = config(7, Role::Origin, 0);
        assert!(matches!(
            ForwardingEngine::new(bad, FixedSampler::default(), RecordingRadio::default()),
            Err(ConfigError::ZeroMaxHops)
        ));
    }

    #[test]
    fn test_origin_sample_tick_builds_packet() {
        let mut origin = engine(config(7, Role::Origin, 4));

        assert_eq!(origin.on_sample_tick(), Disposition::Enqueued);

        let queued = queued_telemetry(&origin);
        assert_eq!(
            queued,
            vec![TelemetryPacket::new(7, 0, ReadingFlag::Temperature, [312])]
        );
        assert_eq!(origin.stats().originated, 1);
    }

    #[test]
    fn test_origin_batches_readings_per_layout() {
        let mut cfg = config(7, Role::Origin, 4);
        cfg.layout = WireLayout::new(3).unwrap();
        let mut origin = engine(cfg);

        origin.on_sample_tick();

        let queued = queued_telemetry(&origin);
        assert_eq!(queued[0].readings.as_slice(), &[312, 312, 312]);
        assert_eq!(origin.sampler().calls.len(), 3);
    }

    #[test]
    fn test_sample_ticks_rotate_reading_type() {
        let mut origin = engine(config(7, Role::Origin, 4));
        for _ in 0..6 {
            origin.on_sample_tick();
        }

        let flags: Vec<_> = queued_telemetry(&origin)
            .iter()
            .map(|p| p.reading_flag)
            .collect();
        assert_eq!(
            flags,
            vec![
                ReadingFlag::Temperature,
                ReadingFlag::Humidity,
                ReadingFlag::Visible,
                ReadingFlag::Infrared,
                ReadingFlag::Voltage,
                ReadingFlag::Temperature,
            ]
        );
    }

    #[test]
    fn test_relay_ignores_sample_tick() {
        let mut relay = engine(config(3, Role::Relay, 4));
        assert_eq!(relay.on_sample_tick(), Disposition::Ignored);
        assert!(relay.queue().is_empty());
        assert!(relay.sampler().calls.is_empty());
    }

    #[test]
    fn test_full_queue_drops_sample_and_still_rotates() {
        let mut cfg = config(7, Role::Origin, 4);
        cfg.queue_capacity = 1;
        let mut origin = engine(cfg);

        assert_eq!(origin.on_sample_tick(), Disposition::Enqueued);
        assert_eq!(
            origin.on_sample_tick(),
            Disposition::Dropped(DropReason::QueueFull)
        );
        assert_eq!(origin.queue().len(), 1);
        assert_eq!(origin.stats().dropped_queue_full, 1);

        // the dropped tick still consumed humidity
        origin.on_transmit_opportunity();
        origin.on_sample_tick();
        assert_eq!(
            queued_telemetry(&origin)[0].reading_flag,
            ReadingFlag::Visible
        );
    }

    #[test]
    fn test_relay_increments_hop_count() {
        let mut relay = engine(config(3, Role::Relay, 4));
        let packet = TelemetryPacket::new(7, 0, ReadingFlag::Temperature, [312]);

        assert_eq!(
            relay.on_packet_received(7, Channel::Telemetry, &telemetry_bytes(&packet)),
            Disposition::Enqueued
        );

        let queued = queued_telemetry(&relay);
        assert_eq!(queued[0].hop_count, 1);
        assert_eq!(queued[0].node_id, 7);
        assert_eq!(relay.stats().relayed, 1);
    }

    #[test]
    fn test_relay_full_queue_drops_inbound() {
        let mut small = config(3, Role::Relay, 4);
        small.queue_capacity = 1;
        let mut relay = engine(small);
        let first = TelemetryPacket::new(7, 0, ReadingFlag::Temperature, [312]);
        let second = TelemetryPacket::new(8, 0, ReadingFlag::Temperature, [313]);

        assert_eq!(
            relay.on_packet_received(7, Channel::Telemetry, &telemetry_bytes(&first)),
            Disposition::Enqueued
        );
        assert_eq!(
            relay.on_packet_received(8, Channel::Telemetry, &telemetry_bytes(&second)),
            Disposition::Dropped(DropReason::QueueFull)
        );

        let queued = queued_telemetry(&relay);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].node_id, 7);
        assert_eq!(relay.stats().relayed, 1);
        assert_eq!(relay.stats().dropped_queue_full, 1);
    }

    #[test]
    fn test_hop_limit_boundary() {
        let max_hops = 5;
        let mut relay = engine(config(3, Role::Relay, max_hops));

        let mut below = TelemetryPacket::new(7, 0, ReadingFlag::Humidity, [1]);
        below.hop_count = max_hops - 1;
        assert_eq!(
            relay.on_packet_received(9, Channel::Telemetry, &telemetry_bytes(&below)),
            Disposition::Enqueued
        );
        assert_eq!(queued_telemetry(&relay)[0].hop_count, max_hops);

        let mut at_limit = below.clone();
        at_limit.hop_count = max_hops;
        assert_eq!(
            relay.on_packet_received(9, Channel::Telemetry, &telemetry_bytes(&at_limit)),
            Disposition::Dropped(DropReason::HopLimitExceeded)
        );
        assert_eq!(relay.queue().len(), 1);
        assert_eq!(relay.stats().dropped_hop_limit, 1);
    }

    #[test]
    fn test_hop_count_never_overflows() {
        let mut relay = engine(config(3, Role::Relay, u8::MAX));
        let mut packet = TelemetryPacket::new(7, 0, ReadingFlag::Humidity, [1]);
        packet.hop_count = u8::MAX;

        assert_eq!(
            relay.on_packet_received(9, Channel::Telemetry, &telemetry_bytes(&packet)),
            Disposition::Dropped(DropReason::HopLimitExceeded)
        );
    }

    #[test]
    fn test_group_mismatch_dropped() {
        let mut relay = engine(config(3, Role::Relay, 4));
        let packet = TelemetryPacket::new(7, 1, ReadingFlag::Temperature, [312]);

        assert_eq!(
            relay.on_packet_received(7, Channel::Telemetry, &telemetry_bytes(&packet)),
            Disposition::Dropped(DropReason::GroupMismatch)
        );
        assert!(relay.queue().is_empty());
    }

    #[test]
    fn test_malformed_bytes_dropped() {
        let mut relay = engine(config(3, Role::Relay, 4));

        assert_eq!(
            relay.on_packet_received(7, Channel::Telemetry, &[1, 2, 3]),
            Disposition::Dropped(DropReason::Format)
        );

        // unknown reading flag
        assert_eq!(
            relay.on_packet_received(7, Channel::Telemetry, &[0, 7, 0, 0, 15, 1, 56]),
            Disposition::Dropped(DropReason::Format)
        );

        // unknown command
        let mut control = [0u8; 19];
        control[0] = 42;
        assert_eq!(
            relay.on_packet_received(7, Channel::Control, &control),
            Disposition::Dropped(DropReason::Format)
        );

        assert_eq!(relay.stats().dropped_format, 3);
        assert!(relay.queue().is_empty());
    }

    #[test]
    fn test_origin_ignores_inbound_telemetry() {
        let mut origin = engine(config(7, Role::Origin, 4));
        let packet = TelemetryPacket::new(8, 0, ReadingFlag::Temperature, [312]);

        assert_eq!(
            origin.on_packet_received(8, Channel::Telemetry, &telemetry_bytes(&packet)),
            Disposition::Ignored
        );
        assert!(origin.queue().is_empty());
        assert_eq!(origin.stats().ignored, 1);
    }

    #[test]
    fn test_ping_answered_immediately_with_one_pong() {
        for role in [Role::Origin, Role::Relay] {
            let mut node = engine(config(3, role, 4));
            let ping = keepalive::build_ping(9, 0xDEAD_BEEF);
            let bytes = Packet::Control(ping).encode();

            assert_eq!(
                node.on_packet_received(9, Channel::Control, &bytes),
                Disposition::Replied
            );
            assert!(node.queue().is_empty());

            let sent = &node.radio().sent;
            assert_eq!(sent.len(), 1);
            let (dest, channel, frame) = &sent[0];
            assert_eq!(*dest, 9);
            assert_eq!(*channel, Channel::Control);

            let pong = ControlPacket::decode(frame).unwrap();
            assert_eq!(pong.command, Command::Pong);
            assert_eq!(pong.node_id, 3);
            assert_eq!(keepalive::corr_id(&pong), 0xDEAD_BEEF);
        }
    }

    #[test]
    fn test_pong_consumed() {
        let mut node = engine(config(3, Role::Relay, 4));
        let corr = keepalive::now_corr_id();
        let ping = keepalive::build_ping(3, corr);
        let pong = Packet::Control(keepalive::build_pong(9, &ping)).encode();

        assert_eq!(
            node.on_packet_received(9, Channel::Control, &pong),
            Disposition::Consumed
        );
        assert_eq!(node.stats().pongs_received, 1);
        assert!(node.stats().last_rtt.is_some());
        assert!(node.radio().sent.is_empty());
    }

    #[test]
    fn test_ping_sends_directly() {
        let mut node = engine(config(3, Role::Relay, 4));
        let corr = node.ping(0);

        let (dest, channel, frame) = &node.radio().sent[0];
        assert_eq!(*dest, 0);
        assert_eq!(*channel, Channel::Control);
        let ping = ControlPacket::decode(frame).unwrap();
        assert_eq!(ping.command, Command::Ping);
        assert_eq!(keepalive::corr_id(&ping), corr);
        assert!(node.queue().is_empty());
    }

    #[test]
    fn test_forward_command_relayed_with_hop_limit() {
        let mut node = engine(config(3, Role::Origin, 2));

        let mut forward = ControlPacket::new(Command::Forward, 9).with_data(&[1, 0xAB]);
        let bytes = Packet::Control(forward).encode();
        assert_eq!(
            node.on_packet_received(9, Channel::Control, &bytes),
            Disposition::Enqueued
        );
        match node.queue().peek() {
            Some(Packet::Control(c)) => {
                assert_eq!(c.forward_hops(), 2);
                assert_eq!(c.data[1], 0xAB);
            }
            other => panic!("expected queued control packet, got {:?}", other),
        }

        forward.set_forward_hops(2);
        let bytes = Packet::Control(forward).encode();
        assert_eq!(
            node.on_packet_received(9, Channel::Control, &bytes),
            Disposition::Dropped(DropReason::HopLimitExceeded)
        );
    }

    #[test]
    fn test_debug_consumed() {
        let mut node = engine(config(3, Role::Relay, 4));
        let debug = ControlPacket::new(Command::Debug, 9).with_data(b"hello");

        assert_eq!(
            node.on_packet_received(9, Channel::Control, &Packet::Control(debug).encode()),
            Disposition::Consumed
        );
        assert_eq!(node.stats().debug_received, 1);
        assert!(node.queue().is_empty());
    }

    #[test]
    fn test_transmit_in_fifo_order_to_next_hop() {
        let mut cfg = config(3, Role::Relay, 8);
        cfg.next_hop = 1;
        let mut relay = engine(cfg);

        for origin in [10u16, 11, 12] {
            let packet = TelemetryPacket::new(origin, 0, ReadingFlag::Voltage, [origin]);
            relay.on_packet_received(origin, Channel::Telemetry, &telemetry_bytes(&packet));
        }

        assert_eq!(relay.on_transmit_opportunity(), Disposition::Transmitted);
        assert_eq!(relay.on_transmit_opportunity(), Disposition::Transmitted);
        assert_eq!(relay.on_transmit_opportunity(), Disposition::Transmitted);
        assert_eq!(relay.on_transmit_opportunity(), Disposition::Idle);

        let layout = relay.config().layout;
        let origins: Vec<u16> = relay
            .radio()
            .sent
            .iter()
            .map(|(dest, channel, frame)| {
                assert_eq!(*dest, 1);
                match layout.decode(*channel, frame).unwrap() {
                    Packet::Telemetry(t) => t.node_id,
                    Packet::Control(_) => panic!("unexpected control packet"),
                }
            })
            .collect();
        assert_eq!(origins, vec![10, 11, 12]);
        assert_eq!(relay.stats().transmitted, 3);
    }

    #[test]
    fn test_end_to_end_chain() {
        // origin 7 -> relay 3 -> relay 2 (max_hops 1) -> basestation 0
        let mut origin_cfg = config(7, Role::Origin, 4);
        origin_cfg.next_hop = 3;
        let mut origin = engine(origin_cfg);

        let mut first_cfg = config(3, Role::Relay, 4);
        first_cfg.next_hop = 2;
        let mut first = engine(first_cfg);

        let mut last = engine(config(2, Role::Relay, 1));

        origin.on_sample_tick();
        origin.on_transmit_opportunity();
        let (dest, channel, frame) = origin.radio_mut().sent.remove(0);
        assert_eq!(dest, 3);
        assert_eq!(
            TelemetryPacket::decode(&frame, 1).unwrap(),
            TelemetryPacket::new(7, 0, ReadingFlag::Temperature, [312])
        );

        assert_eq!(
            first.on_packet_received(7, channel, &frame),
            Disposition::Enqueued
        );
        first.on_transmit_opportunity();
        let (dest, channel, frame) = first.radio_mut().sent.remove(0);
        assert_eq!(dest, 2);
        let relayed = TelemetryPacket::decode(&frame, 1).unwrap();
        assert_eq!(relayed.hop_count, 1);

        // one more hop would make 2 > max_hops 1
        assert_eq!(
            last.on_packet_received(3, channel, &frame),
            Disposition::Dropped(DropReason::HopLimitExceeded)
        );
        assert!(last.queue().is_empty());
    }
}
