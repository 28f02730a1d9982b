//! Hop discovery with TTL-limited echo requests.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sweepr_common::config::DEFAULT_MAX_HOPS;
use sweepr_protocols::icmp::{self, IcmpReply};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::debug;

use crate::network::transport::{self, SharedSender};

const HOP_TIMEOUT: Duration = Duration::from_millis(1000);

#[async_trait]
pub trait Tracer: Send + Sync {
    /// Routers between us and `addr`, nearest first, ending with `addr`
    /// itself when it answered. Silent hops are `0.0.0.0`.
    async fn trace(&self, addr: Ipv4Addr) -> anyhow::Result<Vec<Ipv4Addr>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hop {
    /// An intermediate router reported the TTL expired.
    Router(Ipv4Addr),
    /// The target answered, or something reported it unreachable.
    Final(Ipv4Addr),
}

/// Matches a reply against the probe it should answer.
fn classify(reply: &IcmpReply, identifier: u16, sequence: u16) -> Option<Hop> {
    if reply.identifier() != identifier || reply.sequence() != sequence {
        return None;
    }
    match *reply {
        IcmpReply::TimeExceeded { reporter, .. } => Some(Hop::Router(reporter)),
        IcmpReply::EchoReply { source, .. } => Some(Hop::Final(source)),
        IcmpReply::Unreachable { reporter, .. } => Some(Hop::Final(reporter)),
    }
}

pub struct IcmpTracer {
    sender: SharedSender,
    /// One trace at a time owns the reply stream.
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    identifier: u16,
    sequence: AtomicU16,
    max_hops: u8,
    hop_timeout: Duration,
}

impl IcmpTracer {
    pub fn new() -> anyhow::Result<Self> {
        let handle = transport::start_icmp_capture()?;
        Ok(Self {
            sender: handle.tx,
            rx: Mutex::new(handle.rx),
            identifier: rand::random(),
            sequence: AtomicU16::new(0),
            max_hops: DEFAULT_MAX_HOPS,
            hop_timeout: HOP_TIMEOUT,
        })
    }

    pub fn with_max_hops(mut self, max_hops: u8) -> Self {
        self.max_hops = max_hops;
        self
    }

    async fn send_probe(&self, addr: Ipv4Addr, ttl: u8, sequence: u16) -> anyhow::Result<()> {
        let bytes = icmp::create_echo_request(
            addr,
            self.identifier,
            sequence,
            ttl,
            icmp::DEFAULT_PAYLOAD_LEN,
        )?;
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || transport::send_ipv4(&sender, &bytes, addr)).await??;
        Ok(())
    }

    async fn await_hop(
        &self,
        rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
        sequence: u16,
    ) -> Option<Hop> {
        let deadline = Instant::now() + self.hop_timeout;
        loop {
            let bytes = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) | Err(_) => return None,
            };
            let hop = icmp::parse_reply(&bytes)
                .and_then(|reply| classify(&reply, self.identifier, sequence));
            if hop.is_some() {
                return hop;
            }
        }
    }
}

#[async_trait]
impl Tracer for IcmpTracer {
    async fn trace(&self, addr: Ipv4Addr) -> anyhow::Result<Vec<Ipv4Addr>> {
        let mut rx = self.rx.lock().await;
        let mut hops: Vec<Ipv4Addr> = Vec::new();

        for ttl in 1..=self.max_hops {
            let sequence: u16 = self.sequence.fetch_add(1, Ordering::Relaxed);
            self.send_probe(addr, ttl, sequence).await?;

            match self.await_hop(&mut rx, sequence).await {
                Some(Hop::Router(router)) => hops.push(router),
                Some(Hop::Final(last)) => {
                    hops.push(last);
                    return Ok(hops);
                }
                None => {
                    debug!("hop {ttl} towards {addr} stayed silent");
                    hops.push(Ipv4Addr::UNSPECIFIED);
                }
            }
        }

        debug!("{addr} not reached within {} hops", self.max_hops);
        Ok(hops)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
