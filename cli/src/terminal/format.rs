use std::net::Ipv4Addr;

use colored::*;
use sweepr_common::network::host::{HostResult, OpenPort};

use crate::terminal::colors;

pub type Detail = (String, ColoredString);

pub fn rtt_to_colored(round_trip_ms: u64) -> ColoredString {
    let color = match round_trip_ms {
        0..50 => colors::FAST,
        50..200 => colors::MEDIUM,
        _ => colors::SLOW,
    };
    format!("{round_trip_ms}ms").color(color)
}

pub fn ports_to_colored(ports: &[OpenPort]) -> ColoredString {
    if ports.is_empty() {
        return "none open".color(colors::SEPARATOR);
    }
    let joined: Vec<String> = ports
        .iter()
        .map(|p| {
            format!(
                "{}{}{}{}",
                p.port.to_string().color(colors::PORT),
                "(".color(colors::SEPARATOR),
                p.service_name.color(colors::SERVICE),
                ")".color(colors::SEPARATOR)
            )
        })
        .collect();
    joined.join(" ").normal()
}

pub fn hops_to_colored(hops: &[Ipv4Addr]) -> ColoredString {
    let arrow: String = format!(" {} ", "›".color(colors::SEPARATOR));
    let joined: Vec<String> = hops
        .iter()
        .map(|hop| {
            if hop.is_unspecified() {
                "*".color(colors::SILENT_HOP).to_string()
            } else {
                hop.to_string().color(colors::TEXT_DEFAULT).to_string()
            }
        })
        .collect();
    joined.join(&arrow).normal()
}

pub fn host_to_details(host: &HostResult) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![
        (
            "IPv4".to_string(),
            host.address.to_string().color(colors::IPV4_ADDR),
        ),
        ("RTT".to_string(), rtt_to_colored(host.round_trip_ms)),
        ("TTL".to_string(), host.ttl.to_string().normal()),
        ("Ports".to_string(), ports_to_colored(&host.open_ports)),
    ];

    if let Some(name) = &host.hostname {
        details.insert(1, ("Name".to_string(), name.color(colors::HOSTNAME)));
    }
    if let Some(hops) = &host.trace {
        details.push(("Hops".to_string(), hops_to_colored(hops)));
    }

    details
}

pub fn host_title(host: &HostResult) -> String {
    match &host.hostname {
        Some(name) => name.clone(),
        None => host.address.to_string(),
    }
}

/// One greppable, uncolored line per host.
pub fn raw_line(host: &HostResult) -> String {
    let ports: Vec<String> = host
        .open_ports
        .iter()
        .map(|p| format!("{}/{}", p.port, p.service_name))
        .collect();
    let mut line = format!(
        "{} bytes={} ttl={} time={}ms status=success ports={}",
        host.address,
        host.bytes,
        host.ttl,
        host.round_trip_ms,
        if ports.is_empty() {
            "-".to_string()
        } else {
            ports.join(",")
        }
    );
    if let Some(name) = &host.hostname {
        line.push_str(&format!(" name={name}"));
    }
    if let Some(hops) = &host.trace {
        let hops: Vec<String> = hops
            .iter()
            .map(|h| {
                if h.is_unspecified() {
                    "*".to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();
        line.push_str(&format!(" hops={}", hops.join(">")));
    }
    line
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
