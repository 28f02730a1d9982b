use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use sweepr_common::network::host::{HostResult, OpenPort};
use sweepr_common::network::probe::{EchoProbeOutcome, PortProbeOutcome};
use tracing::debug;

/// Collects per-host results across the sweep and port probe phases.
///
/// Records are keyed by address, so the final result does not depend on the
/// order outcomes arrived in.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    hosts: BTreeMap<Ipv4Addr, HostResult>,
}

impl ResultAggregator {
    /// One record per successful echo; everything else is ignored.
    pub fn from_sweep<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a EchoProbeOutcome>,
    {
        let hosts = outcomes
            .into_iter()
            .filter_map(HostResult::from_echo)
            .map(|host| (host.address, host))
            .collect();
        Self { hosts }
    }

    /// Ascending list of hosts that answered the sweep.
    pub fn live_hosts(&self) -> Vec<Ipv4Addr> {
        self.hosts.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn apply_ports<'a, I>(&mut self, outcomes: I)
    where
        I: IntoIterator<Item = &'a PortProbeOutcome>,
    {
        for outcome in outcomes.into_iter().filter(|o| o.is_open) {
            let Some(host) = self.hosts.get_mut(&outcome.address) else {
                debug!(
                    "ignoring open port {} on {}: not a live host",
                    outcome.port, outcome.address
                );
                continue;
            };
            host.open_ports.push(OpenPort {
                port: outcome.port,
                service_name: outcome.service_name,
            });
        }

        for host in self.hosts.values_mut() {
            host.open_ports.sort_by_key(|p| p.port);
            host.open_ports.dedup_by_key(|p| p.port);
        }
    }

    pub fn hosts_mut(&mut self) -> impl Iterator<Item = &mut HostResult> {
        self.hosts.values_mut()
    }

    pub fn finish(self) -> Vec<HostResult> {
        self.hosts.into_values().collect()
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
