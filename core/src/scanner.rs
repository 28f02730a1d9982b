//! Scan orchestration.
//!
//! A scan runs in two phases separated by a barrier: the echo sweep finds
//! live hosts, then every live host is probed for catalog ports. Tracing and
//! reverse DNS are optional extras applied to a finished report.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use sweepr_common::catalog::PortCatalog;
use sweepr_common::config::{Config, ConfigError, PortScanLimits};
use sweepr_common::network::host::HostResult;
use sweepr_common::network::range::Ipv4Range;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregate::ResultAggregator;
use crate::echo::{EchoProber, IcmpEchoProber};
use crate::network::tcp::{PortConnector, TcpConnector};
use crate::portscan::PortProbeEngine;
use crate::resolver::{DnsResolver, NameResolver};
use crate::sweep::{EchoSweepEngine, ProgressSink, SweepProgress};
use crate::trace::{IcmpTracer, Tracer};

#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Live hosts, ascending by address.
    pub hosts: Vec<HostResult>,
    pub sweep: SweepProgress,
    pub elapsed: Duration,
}

impl ScanReport {
    /// True when no address answered the sweep. Not an error.
    pub fn no_hosts(&self) -> bool {
        self.hosts.is_empty()
    }
}

pub struct Scanner {
    prober: Arc<dyn EchoProber>,
    connector: Arc<dyn PortConnector>,
    catalog: Arc<PortCatalog>,
    interval: Duration,
    port_limits: PortScanLimits,
}

impl Scanner {
    pub fn new(
        config: &Config,
        prober: Arc<dyn EchoProber>,
        connector: Arc<dyn PortConnector>,
        catalog: Arc<PortCatalog>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            prober,
            connector,
            catalog,
            interval: config.interval,
            port_limits: config.port_limits,
        })
    }

    pub async fn run(&self, range: &Ipv4Range, progress: Option<ProgressSink>) -> ScanReport {
        let started = Instant::now();

        let mut engine = EchoSweepEngine::new(self.prober.clone()).with_interval(self.interval);
        if let Some(sink) = progress {
            engine = engine.with_progress(sink);
        }
        let sweep = engine.sweep(range).await;

        let mut aggregator = ResultAggregator::from_sweep(&sweep.outcomes);
        let live: Vec<Ipv4Addr> = aggregator.live_hosts();
        if live.is_empty() {
            info!("no hosts responded, skipping port probe");
        } else {
            let ports = PortProbeEngine::new(
                self.connector.clone(),
                self.catalog.clone(),
                self.port_limits,
            );
            let outcomes = ports.probe_hosts(&live).await;
            aggregator.apply_ports(&outcomes);
        }

        ScanReport {
            hosts: aggregator.finish(),
            sweep: sweep.progress,
            elapsed: started.elapsed(),
        }
    }
}

/// Attaches hostnames and hop lists to the hosts of a finished report.
///
/// Lookups run concurrently; traces run one after another since each one
/// owns the tracer's reply stream.
pub async fn enrich(
    report: &mut ScanReport,
    tracer: Option<&dyn Tracer>,
    resolver: Option<Arc<dyn NameResolver>>,
) {
    let mut lookups: JoinSet<(Ipv4Addr, Option<String>)> = JoinSet::new();
    if let Some(resolver) = resolver {
        for host in &report.hosts {
            let resolver = resolver.clone();
            let addr = host.address;
            lookups.spawn(async move { (addr, resolver.resolve(addr).await) });
        }
    }

    if let Some(tracer) = tracer {
        for host in report.hosts.iter_mut() {
            match tracer.trace(host.address).await {
                Ok(hops) => host.trace = Some(hops),
                Err(e) => warn!("could not trace {}: {e:#}", host.address),
            }
        }
    }

    while let Some(joined) = lookups.join_next().await {
        let (addr, hostname) = match joined {
            Ok(found) => found,
            Err(e) => {
                debug!("reverse lookup task failed: {e}");
                continue;
            }
        };
        if let Some(host) = report.hosts.iter_mut().find(|h| h.address == addr) {
            host.hostname = hostname;
        }
    }
}

/// Runs a complete scan with the production prober, connector and catalog,
/// then enriches the report as `config` asks.
pub async fn perform_scan(
    config: &Config,
    range: &Ipv4Range,
    progress: Option<ProgressSink>,
) -> anyhow::Result<ScanReport> {
    config.validate()?;
    let prober: Arc<dyn EchoProber> = Arc::new(IcmpEchoProber::new()?);
    let catalog = Arc::new(PortCatalog::well_known().clone());
    let scanner = Scanner::new(config, prober, Arc::new(TcpConnector), catalog)?;

    let mut report = scanner.run(range, progress).await;
    if report.no_hosts() {
        return Ok(report);
    }

    let tracer: Option<IcmpTracer> = if config.no_trace {
        None
    } else {
        match IcmpTracer::new() {
            Ok(tracer) => Some(tracer.with_max_hops(config.max_hops)),
            Err(e) => {
                warn!("tracing disabled: {e:#}");
                None
            }
        }
    };
    let resolver: Option<Arc<dyn NameResolver>> = if config.no_dns {
        None
    } else {
        Some(Arc::new(DnsResolver::new(config.dns_server)))
    };

    enrich(
        &mut report,
        tracer.as_ref().map(|t| t as &dyn Tracer),
        resolver,
    )
    .await;
    Ok(report)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
