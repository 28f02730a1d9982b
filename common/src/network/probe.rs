//! Outcomes of the individual probes a scan is built from.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Serialize;

/// Terminal state of one echo probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoStatus {
    Success,
    Timeout,
    Unreachable,
    Error,
}

impl fmt::Display for EchoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EchoStatus::Success => "success",
            EchoStatus::Timeout => "timeout",
            EchoStatus::Unreachable => "unreachable",
            EchoStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoProbeOutcome {
    pub address: Ipv4Addr,
    pub status: EchoStatus,
    /// Size of the echoed payload.
    pub bytes: u16,
    pub ttl: u8,
    pub round_trip: Duration,
}

impl EchoProbeOutcome {
    pub fn success(address: Ipv4Addr, bytes: u16, ttl: u8, round_trip: Duration) -> Self {
        Self {
            address,
            status: EchoStatus::Success,
            bytes,
            ttl,
            round_trip,
        }
    }

    pub fn timeout(address: Ipv4Addr) -> Self {
        Self::failed(address, EchoStatus::Timeout)
    }

    pub fn unreachable(address: Ipv4Addr) -> Self {
        Self::failed(address, EchoStatus::Unreachable)
    }

    pub fn error(address: Ipv4Addr) -> Self {
        Self::failed(address, EchoStatus::Error)
    }

    fn failed(address: Ipv4Addr, status: EchoStatus) -> Self {
        Self {
            address,
            status,
            bytes: 0,
            ttl: 0,
            round_trip: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EchoStatus::Success
    }

    pub fn round_trip_ms(&self) -> u64 {
        self.round_trip.as_millis() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortProbeOutcome {
    pub address: Ipv4Addr,
    pub port: u16,
    pub service_name: &'static str,
    pub is_open: bool,
}
