//! TCP connect probing of the port catalog against live hosts.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use sweepr_common::catalog::PortCatalog;
use sweepr_common::config::PortScanLimits;
use sweepr_common::network::probe::PortProbeOutcome;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::network::tcp::PortConnector;

/// Hard cap on a single connection attempt. A port that has not accepted
/// within this window is reported closed.
pub const PORT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

pub struct PortProbeEngine {
    connector: Arc<dyn PortConnector>,
    catalog: Arc<PortCatalog>,
    limits: PortScanLimits,
}

impl PortProbeEngine {
    pub fn new(
        connector: Arc<dyn PortConnector>,
        catalog: Arc<PortCatalog>,
        limits: PortScanLimits,
    ) -> Self {
        Self {
            connector,
            catalog,
            limits,
        }
    }

    /// Tries every catalog port on every host. Returns one outcome per
    /// (host, port) pair, sorted by address then port.
    pub async fn probe_hosts(&self, hosts: &[Ipv4Addr]) -> Vec<PortProbeOutcome> {
        if hosts.is_empty() || self.catalog.is_empty() {
            return Vec::new();
        }
        info!(
            "probing {} port(s) on {} host(s)",
            self.catalog.len(),
            hosts.len()
        );

        let global = Arc::new(Semaphore::new(permits(self.limits.total)));
        let mut set: JoinSet<PortProbeOutcome> = JoinSet::new();

        for &addr in hosts {
            let per_host = Arc::new(Semaphore::new(permits(self.limits.per_host)));
            for (port, service_name) in self.catalog.iter() {
                let per_host = per_host.clone();
                let global = global.clone();
                let connector = self.connector.clone();
                set.spawn(async move {
                    // Per-host first so a busy host never sits on global permits.
                    let _host_permit = per_host.acquire_owned().await.ok();
                    let _global_permit = global.acquire_owned().await.ok();
                    let is_open = try_port(connector.as_ref(), addr, port).await;
                    PortProbeOutcome {
                        address: addr,
                        port,
                        service_name,
                        is_open,
                    }
                });
            }
        }

        let mut outcomes: Vec<PortProbeOutcome> = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => debug!("port probe task failed: {e}"),
            }
        }
        outcomes.sort_by_key(|o| (o.address, o.port));

        info!(
            "port probe finished: {} open port(s)",
            outcomes.iter().filter(|o| o.is_open).count()
        );
        outcomes
    }
}

async fn try_port(connector: &dyn PortConnector, addr: Ipv4Addr, port: u16) -> bool {
    let target = SocketAddrV4::new(addr, port);
    match tokio::time::timeout(PORT_CONNECT_TIMEOUT, connector.connect(target)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("{target} closed: {e}");
            false
        }
        Err(_) => {
            debug!("{target} filtered: no answer within {PORT_CONNECT_TIMEOUT:?}");
            false
        }
    }
}

fn permits(limit: usize) -> usize {
    limit.clamp(1, Semaphore::MAX_PERMITS)
}

pub fn open_outcomes(outcomes: &[PortProbeOutcome]) -> impl Iterator<Item = &PortProbeOutcome> {
    outcomes.iter().filter(|o| o.is_open)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
