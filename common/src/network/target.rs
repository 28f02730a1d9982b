//! # Scan Target Parsing
//!
//! Turns command-line input into an [`Ipv4Range`]. Accepted forms:
//! * A single IPv4 address (`10.0.0.7`).
//! * An explicit range (`10.0.0.1-10.0.0.20`).
//! * An abbreviated range (`192.168.1.1-50`, `192.168.1.1-2.50`).
//! * A CIDR block (`192.168.1.0/24`).

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::network::range::{self, Ipv4Range, RangeError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid start address '{input}': {reason}")]
    InvalidStart { input: String, reason: String },
    #[error("invalid end of range '{input}': {reason}")]
    InvalidEnd { input: String, reason: String },
    #[error("invalid prefix in '{0}'")]
    InvalidPrefix(String),
    #[error("unrecognized target: {0}")]
    Unrecognized(String),
    #[error(transparent)]
    Range(#[from] RangeError),
}

/// Parses `start` and an optional `end` into a range.
///
/// With an `end` given, both sides are combined as `start-end`, so the end
/// may be abbreviated the same way.
pub fn parse(start: &str, end: Option<&str>) -> Result<Ipv4Range, TargetError> {
    match end {
        Some(end) => parse_target(&format!("{}-{}", start.trim(), end.trim())),
        None => parse_target(start),
    }
}

pub fn parse_target(s: &str) -> Result<Ipv4Range, TargetError> {
    let s = s.trim();

    if let Some(range) = parse_ip_range(s)? {
        return Ok(range);
    }

    if let Some(range) = parse_cidr_range(s)? {
        return Ok(range);
    }

    if let Ok(addr) = s.parse::<Ipv4Addr>() {
        return Ok(Ipv4Range::single(addr));
    }

    Err(TargetError::Unrecognized(s.to_string()))
}

/// Parses a range string like "1.1.1.1-2.2.2.2" or "1.1.1.1-50".
fn parse_ip_range(s: &str) -> Result<Option<Ipv4Range>, TargetError> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    let start_addr = start_str
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| TargetError::InvalidStart {
            input: start_str.to_string(),
            reason: e.to_string(),
        })?;

    let end_addr = parse_range_end_addr(end_str.trim(), &start_addr)?;

    Ok(Some(Ipv4Range::new(start_addr, end_addr)?))
}

/// Handles abbreviated forms like "192.168.1.1-50" (implies 192.168.1.50)
/// and full forms like "192.168.1.1-192.168.1.255".
fn parse_range_end_addr(end_str: &str, start_addr: &Ipv4Addr) -> Result<Ipv4Addr, TargetError> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    let invalid = |reason: String| TargetError::InvalidEnd {
        input: end_str.to_string(),
        reason,
    };

    if end_str.is_empty() {
        return Err(invalid("end of range cannot be empty".to_string()));
    }

    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(|octet_str| octet_str.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| invalid(e.to_string()))?;

    if partial_octets.len() > 4 {
        return Err(invalid("too many octets".to_string()));
    }

    let mut end_octets = start_addr.octets();
    let start_index = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

/// Parses CIDR notation like "192.168.1.0/24".
fn parse_cidr_range(s: &str) -> Result<Option<Ipv4Range>, TargetError> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Ok(None);
    };

    let addr = ip_str
        .parse::<Ipv4Addr>()
        .map_err(|e| TargetError::InvalidStart {
            input: ip_str.to_string(),
            reason: e.to_string(),
        })?;

    let prefix = prefix_str
        .parse::<u8>()
        .map_err(|_| TargetError::InvalidPrefix(s.to_string()))?;

    Ok(Some(range::cidr_range(addr, prefix)?))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
