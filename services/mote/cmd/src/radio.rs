//! UDP stand-in for the mote radio.
//!
//! Each AM frame travels as one datagram to the socket address of the node it
//! is addressed to, or to every neighbour for broadcast. Sending is fire and
//! forget: frames go through a channel to a sender task and any socket error
//! is only logged.

use bytes::Bytes;
use mote_forward::Radio;
use mote_wire::{AmFrame, Channel, WireError, AM_BROADCAST};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Largest datagram we expect to read
pub const MAX_DATAGRAM: usize = 512;

/// Encoded frame on its way to a socket address
#[derive(Debug, Clone)]
pub struct OutboundDatagram {
    /// Where to send it
    pub addr: SocketAddr,
    /// AM header plus payload
    pub bytes: Bytes,
}

/// Radio that hands AM frames to the UDP sender task
#[derive(Debug, Clone)]
pub struct UdpRadio {
    node_id: u16,
    neighbors: Arc<BTreeMap<u16, SocketAddr>>,
    outbound_tx: mpsc::UnboundedSender<OutboundDatagram>,
}

impl UdpRadio {
    pub fn new(
        node_id: u16,
        neighbors: BTreeMap<u16, SocketAddr>,
        outbound_tx: mpsc::UnboundedSender<OutboundDatagram>,
    ) -> Self {
        Self {
            node_id,
            neighbors: Arc::new(neighbors),
            outbound_tx,
        }
    }

    /// Socket addresses a frame for `dest` goes to
    fn resolve(&self, dest: u16) -> Vec<SocketAddr> {
        if dest == AM_BROADCAST {
            return self.neighbors.values().copied().collect();
        }

        match self.neighbors.get(&dest) {
            Some(addr) => vec![*addr],
            None => {
                warn!("no neighbor address for node {}, frame lost", dest);
                Vec::new()
            }
        }
    }
}

impl Radio for UdpRadio {
    fn send(&mut self, dest: u16, channel: Channel, frame: Bytes) {
        let am = match AmFrame::new(dest, self.node_id, channel, frame) {
            Ok(am) => am,
            Err(e) => {
                warn!("cannot frame packet for node {}: {}", dest, e);
                return;
            }
        };
        let bytes = am.encode();

        for addr in self.resolve(dest) {
            let datagram = OutboundDatagram {
                addr,
                bytes: bytes.clone(),
            };
            if self.outbound_tx.send(datagram).is_err() {
                warn!("radio sender stopped, frame to node {} lost", dest);
            }
        }
    }
}

/// Parse a received datagram, keeping frames addressed to `node_id`
pub fn accept_datagram(node_id: u16, datagram: &[u8]) -> Result<Option<AmFrame>, WireError> {
    let frame = AmFrame::decode(Bytes::copy_from_slice(datagram))?;
    if !frame.is_for(node_id) {
        trace!(
            "ignoring frame for node {} from node {}",
            frame.header.dest,
            frame.header.src
        );
        return Ok(None);
    }
    Ok(Some(frame))
}

/// Drain the outbound channel onto the socket until every radio is dropped
pub async fn run_sender(
    socket: Arc<UdpSocket>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundDatagram>,
) {
    while let Some(datagram) = outbound_rx.recv().await {
        match socket.send_to(&datagram.bytes, datagram.addr).await {
            Ok(n) => trace!("sent {} bytes to {}", n, datagram.addr),
            Err(e) => debug!("send to {} failed: {}", datagram.addr, e),
        }
    }
}
