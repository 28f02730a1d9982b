use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);
pub const DEFAULT_PORTS_PER_HOST: usize = 32;
pub const DEFAULT_PORTS_TOTAL: usize = 256;
pub const DEFAULT_MAX_HOPS: u8 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pacing interval must be greater than zero")]
    ZeroInterval,
    #[error("port probe concurrency ({0}) must be at least 1")]
    ZeroConcurrency(&'static str),
    #[error("max hops must be between 1 and 255")]
    ZeroHops,
}

/// Bounds on how many port connection attempts may be in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortScanLimits {
    /// Attempts in flight against a single host.
    pub per_host: usize,
    /// Attempts in flight across all hosts.
    pub total: usize,
}

impl Default for PortScanLimits {
    fn default() -> Self {
        Self {
            per_host: DEFAULT_PORTS_PER_HOST,
            total: DEFAULT_PORTS_TOTAL,
        }
    }
}

pub struct Config {
    /// Delay between two echo probe dispatches.
    pub interval: Duration,
    pub port_limits: PortScanLimits,
    /// Print full probe metadata instead of the summarized view.
    pub raw: bool,
    pub quiet: u8,
    /// Skips reverse name resolution of live hosts.
    pub no_dns: bool,
    /// Skips path tracing to live hosts.
    pub no_trace: bool,
    pub dns_server: SocketAddr,
    pub max_hops: u8,
    /// Where to write the JSON export, if anywhere.
    pub output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            port_limits: PortScanLimits::default(),
            raw: false,
            quiet: 0,
            no_dns: false,
            no_trace: false,
            dns_server: SocketAddr::from(([1, 1, 1, 1], 53)),
            max_hops: DEFAULT_MAX_HOPS,
            output: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.port_limits.per_host == 0 {
            return Err(ConfigError::ZeroConcurrency("per host"));
        }
        if self.port_limits.total == 0 {
            return Err(ConfigError::ZeroConcurrency("total"));
        }
        if self.max_hops == 0 {
            return Err(ConfigError::ZeroHops);
        }
        Ok(())
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
