use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sweepr_common::network::probe::EchoProbeOutcome;
use sweepr_core::echo::EchoProber;
use sweepr_core::network::tcp::PortConnector;

/// Replies from a script; addresses not in it time out immediately.
#[derive(Default)]
pub struct MockProber {
    replies: HashMap<Ipv4Addr, EchoProbeOutcome>,
    delays: HashMap<Ipv4Addr, Duration>,
    probes: AtomicUsize,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, addr: Ipv4Addr, bytes: u16, ttl: u8, rtt_ms: u64) -> Self {
        let rtt = Duration::from_millis(rtt_ms);
        self.replies
            .insert(addr, EchoProbeOutcome::success(addr, bytes, ttl, rtt));
        self.delays.insert(addr, rtt);
        self
    }

    pub fn unreachable(mut self, addr: Ipv4Addr) -> Self {
        self.replies.insert(addr, EchoProbeOutcome::unreachable(addr));
        self
    }

    /// Delays the scripted answer for `addr` by `delay`.
    pub fn delayed(mut self, addr: Ipv4Addr, delay: Duration) -> Self {
        self.delays.insert(addr, delay);
        self
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EchoProber for MockProber {
    async fn probe(&self, addr: Ipv4Addr) -> EchoProbeOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&addr) {
            tokio::time::sleep(*delay).await;
        }
        self.replies
            .get(&addr)
            .cloned()
            .unwrap_or_else(|| EchoProbeOutcome::timeout(addr))
    }
}

/// Accepts connections on a fixed set of endpoints, refuses the rest.
#[derive(Default)]
pub struct MockConnector {
    open: HashSet<SocketAddrV4>,
    attempts: AtomicUsize,
    attempted_hosts: std::sync::Mutex<HashSet<Ipv4Addr>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.open.insert(SocketAddrV4::new(addr, port));
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn attempted_hosts(&self) -> HashSet<Ipv4Addr> {
        self.attempted_hosts
            .lock()
            .map(|hosts| hosts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PortConnector for MockConnector {
    async fn connect(&self, addr: SocketAddrV4) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut hosts) = self.attempted_hosts.lock() {
            hosts.insert(*addr.ip());
        }
        if self.open.contains(&addr) {
            Ok(())
        } else {
            Err(io::ErrorKind::ConnectionRefused.into())
        }
    }
}

/// Accepts every connection, but only after `delay`.
pub struct SlowConnector {
    pub delay: Duration,
}

#[async_trait]
impl PortConnector for SlowConnector {
    async fn connect(&self, _addr: SocketAddrV4) -> io::Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
