//! Raw ICMP channel shared by the echo prober and the tracer.
//!
//! Opening the channel requires root (or `CAP_NET_RAW`). Received packets are
//! read on a dedicated OS thread and forwarded into a tokio channel, so the
//! async side never blocks on the socket.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use pnet::{
    packet::{Packet, ip::IpNextHeaderProtocols, ipv4::Ipv4Packet},
    transport::{self, TransportChannelType, TransportReceiver, TransportSender},
};
use tokio::sync::mpsc;
use tracing::debug;

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const CHANNEL_TYPE_ICMP: TransportChannelType =
    TransportChannelType::Layer3(IpNextHeaderProtocols::Icmp);
/// How often the listener thread checks whether anyone is still listening.
const LISTENER_POLL: Duration = Duration::from_millis(250);

pub type SharedSender = Arc<Mutex<TransportSender>>;

pub struct IcmpHandle {
    pub tx: SharedSender,
    /// Full IPv4 packets, header included.
    pub rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

pub fn start_icmp_capture() -> anyhow::Result<IcmpHandle> {
    let (tx, rx_socket) = open_channel()?;
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || listen(rx_socket, queue_tx));

    Ok(IcmpHandle {
        tx: Arc::new(Mutex::new(tx)),
        rx: queue_rx,
    })
}

fn listen(mut rx_socket: TransportReceiver, queue_tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut iterator = transport::ipv4_packet_iter(&mut rx_socket);
    loop {
        if queue_tx.is_closed() {
            break;
        }
        match iterator.next_with_timeout(LISTENER_POLL) {
            Ok(Some((packet, _source))) => {
                if queue_tx.send(packet.packet().to_vec()).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => debug!("icmp receive failed: {e}"),
        }
    }
}

/// Blocking send of a complete IPv4 packet. Run it on a blocking thread.
pub fn send_ipv4(sender: &SharedSender, bytes: &[u8], dst_addr: Ipv4Addr) -> anyhow::Result<()> {
    let packet: Ipv4Packet = Ipv4Packet::new(bytes).context("truncated ipv4 packet")?;
    let mut sender = sender
        .lock()
        .map_err(|_| anyhow::anyhow!("icmp sender lock poisoned"))?;
    sender
        .send_to(packet, IpAddr::V4(dst_addr))
        .with_context(|| format!("sending icmp packet to {dst_addr}"))?;
    Ok(())
}

fn open_channel() -> anyhow::Result<(TransportSender, TransportReceiver)> {
    let (tx, rx) = transport::transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP)
        .context("opening raw ICMP socket (requires root)")?;
    Ok((tx, rx))
}
