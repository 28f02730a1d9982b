use std::net::Ipv4Addr;

use serde::Serialize;

use crate::network::probe::EchoProbeOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenPort {
    pub port: u16,
    pub service_name: &'static str,
}

/// A host that answered the echo sweep.
///
/// Only built from a successful echo outcome. The port probe appends to
/// `open_ports`; `hostname` and `trace` are filled in afterwards by the
/// name resolver and tracer, when those run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostResult {
    pub address: Ipv4Addr,
    pub bytes: u16,
    pub ttl: u8,
    pub round_trip_ms: u64,
    pub open_ports: Vec<OpenPort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<Ipv4Addr>>,
}

impl HostResult {
    /// Returns `None` for anything but a successful echo.
    pub fn from_echo(outcome: &EchoProbeOutcome) -> Option<Self> {
        if !outcome.is_success() {
            return None;
        }
        Some(Self {
            address: outcome.address,
            bytes: outcome.bytes,
            ttl: outcome.ttl,
            round_trip_ms: outcome.round_trip_ms(),
            open_ports: Vec::new(),
            hostname: None,
            trace: None,
        })
    }

    pub fn with_hostname(mut self, hostname: String) -> Self {
        self.hostname = Some(hostname);
        self
    }

    pub fn is_port_open(&self, port: u16) -> bool {
        self.open_ports.iter().any(|p| p.port == port)
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
