pub mod ports;
pub mod scan;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use sweepr_common::config::{
    Config, DEFAULT_INTERVAL, DEFAULT_MAX_HOPS, DEFAULT_PORTS_PER_HOST, DEFAULT_PORTS_TOTAL, PortScanLimits,
};

#[derive(Parser)]
#[command(name = "sweepr")]
#[command(version, about = "ICMP echo sweep and TCP service probe for IPv4 ranges.")]
pub struct CommandLine {
    /// Less output; repeat for less still
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sweep a range for live hosts and probe their services
    #[command(alias = "s")]
    Scan(ScanArgs),
    /// List the ports probed on every live host
    #[command(alias = "p")]
    Ports,
}

#[derive(Args)]
pub struct ScanArgs {
    /// First address, a CIDR block (10.0.0.0/24) or a range (10.0.0.1-50)
    pub start: String,

    /// Last address of the range, inclusive
    pub end: Option<String>,

    /// Milliseconds to wait between two echo probes
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL.as_millis() as u64)]
    pub interval: u64,

    /// Port connections in flight against one host
    #[arg(long, default_value_t = DEFAULT_PORTS_PER_HOST)]
    pub per_host: usize,

    /// Port connections in flight overall
    #[arg(long, default_value_t = DEFAULT_PORTS_TOTAL)]
    pub total: usize,

    /// One plain line per host instead of the tree view
    #[arg(long)]
    pub raw: bool,

    /// Skip reverse DNS lookups
    #[arg(long)]
    pub no_dns: bool,

    /// Skip hop tracing
    #[arg(long)]
    pub no_trace: bool,

    /// Server used for reverse lookups
    #[arg(long, default_value = "1.1.1.1:53")]
    pub dns_server: SocketAddr,

    /// Give up tracing after this many hops
    #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
    pub max_hops: u8,

    /// Write results as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ScanArgs {
    pub fn to_config(&self, quiet: u8) -> Config {
        Config {
            interval: Duration::from_millis(self.interval),
            port_limits: PortScanLimits {
                per_host: self.per_host,
                total: self.total,
            },
            raw: self.raw,
            quiet,
            no_dns: self.no_dns,
            no_trace: self.no_trace,
            dns_server: self.dns_server,
            max_hops: self.max_hops,
            output: self.output.clone(),
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
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
