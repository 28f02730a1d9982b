//! Reverse DNS lookups for live hosts.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sweepr_protocols::dns;
use tokio::net::UdpSocket;
use tracing::debug;

const DNS_TIMEOUT: Duration = Duration::from_millis(1000);
const MAX_DNS_MESSAGE: usize = 512;

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// `None` when the address has no name or the lookup failed.
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String>;
}

/// PTR lookups against a single upstream server over plain UDP.
pub struct DnsResolver {
    server: SocketAddr,
    timeout: Duration,
    id_counter: AtomicU16,
}

impl DnsResolver {
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            timeout: DNS_TIMEOUT,
            id_counter: AtomicU16::new(rand::random()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn next_id(&self) -> u16 {
        self.id_counter.fetch_add(1, Ordering::Relaxed)
    }

    async fn query_ptr(&self, addr: Ipv4Addr) -> anyhow::Result<String> {
        let id: u16 = self.next_id();
        let query: Vec<u8> = dns::create_ptr_packet(&addr, id)?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .context("binding dns socket")?;
        socket
            .connect(self.server)
            .await
            .with_context(|| format!("connecting to dns server {}", self.server))?;
        socket.send(&query).await.context("sending ptr query")?;

        let mut buf = [0u8; MAX_DNS_MESSAGE];
        loop {
            let len: usize = socket.recv(&mut buf).await.context("receiving dns reply")?;
            match dns::get_hostname(&buf[..len]) {
                Ok((reply_id, hostname)) if reply_id == id => return Ok(hostname),
                Ok((reply_id, _)) => debug!("stray dns reply {reply_id}, expected {id}"),
                Err(dns::DnsError::NotAResponse) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl NameResolver for DnsResolver {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        match tokio::time::timeout(self.timeout, self.query_ptr(addr)).await {
            Ok(Ok(hostname)) => Some(hostname),
            Ok(Err(e)) => {
                debug!("reverse lookup of {addr} failed: {e:#}");
                None
            }
            Err(_) => {
                debug!("reverse lookup of {addr} timed out");
                None
            }
        }
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
