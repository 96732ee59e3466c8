//! Mote node binary.
//!
//! Runs one mote of the telemetry network on a UDP socket standing in for the
//! radio: an origin samples the synthetic sensor board, a relay forwards what
//! it hears, and `--basestation` turns the node into the sink that prints one
//! JSON record per reading on stdout and optionally uploads it over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use mote_forward::{Disposition, ForwardingEngine, Role};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use tracing_subscriber::EnvFilter;

#[macro_use]
mod logging;
mod basestation;
mod config;
mod radio;
mod sensor;
mod upload;

use basestation::Basestation;
use config::NodeConfig;
use logging::MoteLogFormatter;
use radio::{accept_datagram, run_sender, UdpRadio, MAX_DATAGRAM};
use sensor::SyntheticSensor;
use upload::Uploader;

/// Telemetry mote on a UDP radio
#[derive(Parser, Debug)]
#[command(name = "mote", version, about = "Queue-backed multi-hop telemetry mote")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "mote.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run as the basestation sink instead of a forwarding mote
    #[arg(long)]
    basestation: bool,

    /// Also POST every reading to this URL, e.g. http://127.0.0.1:8080/sensors/upload
    #[arg(long, requires = "basestation")]
    upload_url: Option<String>,

    /// Stop the basestation after this many telemetry packets
    #[arg(long, requires = "basestation", value_parser = clap::value_parser!(u64).range(1..))]
    packets: Option<u64>,

    /// Seed for the synthetic sensor board
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("mote={}", args.log_level).parse()?)
        .add_directive(format!("mote_forward={}", args.log_level).parse()?)
        .add_directive(format!("mote_queue={}", args.log_level).parse()?)
        .add_directive(format!("mote_wire={}", args.log_level).parse()?);

    let formatter = MoteLogFormatter::new("mote".to_string());

    // stdout is reserved for basestation records
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .event_format(formatter)
        .init();

    info!("Starting mote v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load_from_file(&args.config)?;
    let uploader = args.upload_url.as_deref().map(Uploader::new).transpose()?;

    let socket = UdpSocket::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind radio socket {}", config.bind))?;
    let socket = Arc::new(socket);
    component_info!(
        "radio",
        "Radio bound to {} with {} neighbors",
        config.bind,
        config.neighbors.len()
    );

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let sender = tokio::spawn(run_sender(socket.clone(), outbound_rx));
    let radio = UdpRadio::new(config.node_id, config.neighbors.clone(), outbound_tx);

    if args.basestation {
        let sink = Basestation::new(config.node_id, config.group_id, config.layout()?, radio)
            .with_packet_limit(args.packets);
        run_basestation(&config, &socket, sink, uploader.as_ref()).await?;
    } else {
        let sensor = match args.seed {
            Some(seed) => SyntheticSensor::seeded(seed),
            None => SyntheticSensor::new(),
        };
        run_node(&config, &socket, radio, sensor).await?;
    }

    // every radio handle is gone once the loops return
    if let Err(e) = sender.await {
        warn!("Radio sender task failed: {}", e);
    }

    info!("Mote {} stopped", config.node_id);
    Ok(())
}

/// Forwarding mote event loop.
///
/// Every event is handled to completion before the next one is picked, so the
/// engine needs no locking.
async fn run_node(
    config: &NodeConfig,
    socket: &UdpSocket,
    radio: UdpRadio,
    sensor: SyntheticSensor,
) -> Result<()> {
    let forwarding = config.forwarding()?;
    let mut engine = ForwardingEngine::new(config.engine_config()?, sensor, radio)?;

    let mut sample_tick = ticker(forwarding.sample_period);
    let mut transmit_tick = ticker(forwarding.transmit_period);
    let mut stats_tick = ticker(config.stats_interval);
    let ping_target = forwarding.ping.as_ref().map(|ping| ping.target);
    let mut ping_tick = ticker(
        forwarding
            .ping
            .as_ref()
            .map_or(config.stats_interval, |ping| ping.interval),
    );

    let is_origin = forwarding.role == Role::Origin;
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal, shutting down");
                break;
            }
            _ = sample_tick.tick(), if is_origin => {
                let disposition = engine.on_sample_tick();
                trace!("sample tick: {:?}", disposition);
            }
            _ = transmit_tick.tick() => {
                if engine.on_transmit_opportunity() == Disposition::Transmitted {
                    trace!("transmitted, {} still queued", engine.queue().len());
                }
            }
            _ = ping_tick.tick(), if ping_target.is_some() => {
                if let Some(target) = ping_target {
                    engine.ping(target);
                }
            }
            _ = stats_tick.tick() => {
                let stats = engine.stats();
                component_info!(
                    "stats",
                    "originated={} relayed={} transmitted={} dropped={} queued={}/{} rtt={:?}",
                    stats.originated,
                    stats.relayed,
                    stats.transmitted,
                    stats.dropped(),
                    engine.queue().len(),
                    engine.queue().capacity(),
                    stats.last_rtt
                );
            }
            received = socket.recv_from(&mut buf) => {
                let (n, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        component_warn!("radio", "Receive failed: {}", e);
                        continue;
                    }
                };
                match accept_datagram(config.node_id, &buf[..n]) {
                    Ok(Some(frame)) => {
                        let disposition = engine.on_packet_received(
                            frame.header.src,
                            frame.header.channel,
                            &frame.payload,
                        );
                        trace!("frame from node {}: {:?}", frame.header.src, disposition);
                    }
                    Ok(None) => {}
                    Err(e) => debug!("unreadable frame from {}: {}", peer, e),
                }
            }
        }
    }

    let stats = engine.stats();
    info!(
        "Final counters: originated={} relayed={} transmitted={} dropped={} (format={} group={} hops={} full={})",
        stats.originated,
        stats.relayed,
        stats.transmitted,
        stats.dropped(),
        stats.dropped_format,
        stats.dropped_group,
        stats.dropped_hop_limit,
        stats.dropped_queue_full
    );
    Ok(())
}

/// Basestation event loop
async fn run_basestation(
    config: &NodeConfig,
    socket: &UdpSocket,
    mut sink: Basestation<UdpRadio>,
    uploader: Option<&Uploader>,
) -> Result<()> {
    if let Some(uploader) = uploader {
        component_info!("upload", "Uploading readings to {}", uploader.url());
    }
    let mut stats_tick = ticker(config.stats_interval);
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal, shutting down");
                break;
            }
            _ = stats_tick.tick() => {
                let stats = sink.stats();
                component_info!(
                    "sink",
                    "records={} origins={} pings={} dropped={}",
                    stats.records,
                    stats.packets_by_origin.len(),
                    stats.pings_answered,
                    stats.dropped
                );
            }
            received = socket.recv_from(&mut buf) => {
                let (n, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        component_warn!("radio", "Receive failed: {}", e);
                        continue;
                    }
                };
                match accept_datagram(config.node_id, &buf[..n]) {
                    Ok(Some(frame)) => {
                        let records = sink.handle(
                            frame.header.src,
                            frame.header.channel,
                            &frame.payload,
                            chrono::Utc::now(),
                            &mut std::io::stdout().lock(),
                        )?;
                        if let Some(uploader) = uploader {
                            for record in &records {
                                if let Err(e) = uploader.upload(record).await {
                                    component_warn!(
                                        "upload",
                                        "Reading from mote {} not uploaded: {:#}",
                                        record.sensorid,
                                        e
                                    );
                                }
                            }
                        }
                        if sink.is_done() {
                            info!("Received {} telemetry packets, stopping", sink.packets());
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!("unreadable frame from {}: {}", peer, e),
                }
            }
        }
    }

    for (origin, packets) in &sink.stats().packets_by_origin {
        info!("Received {} packets from mote {}", packets, origin);
    }
    Ok(())
}

/// Interval whose first tick is one period from now
fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
