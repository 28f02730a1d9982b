//! ICMP echo probing.
//!
//! [`EchoProber`] is the seam the sweep engine depends on. [`IcmpEchoProber`]
//! is the raw-socket implementation: every probe registers a oneshot under its
//! target address, and a single demultiplexer task routes each incoming reply
//! to the probe waiting on that address.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sweepr_common::network::probe::EchoProbeOutcome;
use sweepr_protocols::icmp::{self, IcmpReply};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::network::transport::{self, SharedSender};
use crate::sweep::ECHO_TIMEOUT;

const ECHO_TTL: u8 = 64;

#[async_trait]
pub trait EchoProber: Send + Sync {
    /// Sends one echo request to `addr` and reports how it ended.
    ///
    /// Never fails: a missing reply is a [`Timeout`] outcome, a local send
    /// problem is an [`Error`] outcome.
    ///
    /// [`Timeout`]: sweepr_common::network::probe::EchoStatus::Timeout
    /// [`Error`]: sweepr_common::network::probe::EchoStatus::Error
    async fn probe(&self, addr: Ipv4Addr) -> EchoProbeOutcome;
}

struct Pending {
    sequence: u16,
    sent_at: Instant,
    reply_tx: oneshot::Sender<EchoProbeOutcome>,
}

type PendingMap = Arc<Mutex<HashMap<Ipv4Addr, Pending>>>;

/// Removes a probe's pending entry however the probe ends, including when
/// the future is dropped by an outer timeout.
struct PendingGuard {
    pending: PendingMap,
    addr: Ipv4Addr,
    sequence: u16,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(&self.addr).is_some_and(|p| p.sequence == self.sequence) {
            pending.remove(&self.addr);
        }
    }
}

pub struct IcmpEchoProber {
    sender: SharedSender,
    pending: PendingMap,
    identifier: u16,
    sequence: AtomicU16,
    demux: JoinHandle<()>,
}

impl IcmpEchoProber {
    /// Opens the raw ICMP channel and starts routing replies.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> anyhow::Result<Self> {
        let handle = transport::start_icmp_capture()?;
        let identifier: u16 = rand::random();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let demux = tokio::spawn(demultiplex(handle.rx, pending.clone(), identifier));

        Ok(Self {
            sender: handle.tx,
            pending,
            identifier,
            sequence: AtomicU16::new(0),
            demux,
        })
    }

    fn register(&self, addr: Ipv4Addr, sequence: u16) -> oneshot::Receiver<EchoProbeOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let entry = Pending {
            sequence,
            sent_at: Instant::now(),
            reply_tx,
        };
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.insert(addr, entry).is_some() {
            debug!("replaced in-flight echo probe for {addr}");
        }
        reply_rx
    }
}

impl Drop for IcmpEchoProber {
    fn drop(&mut self) {
        self.demux.abort();
    }
}

#[async_trait]
impl EchoProber for IcmpEchoProber {
    async fn probe(&self, addr: Ipv4Addr) -> EchoProbeOutcome {
        let sequence: u16 = self.sequence.fetch_add(1, Ordering::Relaxed);
        let bytes = match icmp::create_echo_request(
            addr,
            self.identifier,
            sequence,
            ECHO_TTL,
            icmp::DEFAULT_PAYLOAD_LEN,
        ) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("could not build echo request for {addr}: {e}");
                return EchoProbeOutcome::error(addr);
            }
        };

        let reply_rx = self.register(addr, sequence);
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            addr,
            sequence,
        };

        let sender = self.sender.clone();
        let sent = tokio::task::spawn_blocking(move || transport::send_ipv4(&sender, &bytes, addr)).await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("echo request to {addr} failed: {e:#}");
                return EchoProbeOutcome::error(addr);
            }
            Err(e) => {
                debug!("echo send task for {addr} failed: {e}");
                return EchoProbeOutcome::error(addr);
            }
        }

        match tokio::time::timeout(ECHO_TIMEOUT, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => EchoProbeOutcome::error(addr),
            Err(_) => EchoProbeOutcome::timeout(addr),
        }
    }
}

async fn demultiplex(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: PendingMap,
    identifier: u16,
) {
    while let Some(bytes) = rx.recv().await {
        let Some(reply) = icmp::parse_reply(&bytes) else {
            continue;
        };
        if reply.identifier() != identifier {
            continue;
        }
        resolve_reply(&pending, reply);
    }
    debug!("icmp listener closed, no more echo replies will be routed");
}

fn resolve_reply(pending: &PendingMap, reply: IcmpReply) {
    let addr: Ipv4Addr = reply.probed_addr();
    let entry = {
        let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.get(&addr) {
            Some(entry) if entry.sequence == reply.sequence() => pending.remove(&addr),
            _ => None,
        }
    };
    let Some(entry) = entry else {
        return;
    };

    let outcome = match reply {
        IcmpReply::EchoReply {
            ttl, payload_len, ..
        } => EchoProbeOutcome::success(
            addr,
            u16::try_from(payload_len).unwrap_or(u16::MAX),
            ttl,
            entry.sent_at.elapsed(),
        ),
        IcmpReply::Unreachable { reporter, .. } | IcmpReply::TimeExceeded { reporter, .. } => {
            debug!("{addr} reported unreachable by {reporter}");
            EchoProbeOutcome::unreachable(addr)
        }
    };
    let _ = entry.reply_tx.send(outcome);
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
