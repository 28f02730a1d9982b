//! # IPv4 Range Model
//!
//! An inclusive, validated range of IPv4 addresses and the lazy expansion of
//! that range into the sequence of addresses a sweep will probe.

use std::net::Ipv4Addr;
use std::ops::RangeInclusive;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("start address {start} is greater than end address {end}")]
    Inverted { start: Ipv4Addr, end: Ipv4Addr },
    #[error("invalid prefix: {0} > 32")]
    InvalidPrefix(u8),
}

/// Continuous range of IPv4 addresses, inclusive on both ends.
///
/// Construction fails when `start_addr > end_addr`, so every value of this type
/// describes at least one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    start_addr: Ipv4Addr,
    end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Result<Self, RangeError> {
        if u32::from(start_addr) > u32::from(end_addr) {
            return Err(RangeError::Inverted {
                start: start_addr,
                end: end_addr,
            });
        }
        Ok(Self {
            start_addr,
            end_addr,
        })
    }

    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            start_addr: addr,
            end_addr: addr,
        }
    }

    pub fn start_addr(&self) -> Ipv4Addr {
        self.start_addr
    }

    pub fn end_addr(&self) -> Ipv4Addr {
        self.end_addr
    }

    /// Number of addresses in the range. A `/0` range holds 2^32 addresses,
    /// which does not fit in a `u32`.
    pub fn len(&self) -> u64 {
        u64::from(u32::from(self.end_addr)) - u64::from(u32::from(self.start_addr)) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let value: u32 = addr.into();
        u32::from(self.start_addr) <= value && value <= u32::from(self.end_addr)
    }

    /// Lazily yields every address in ascending order.
    ///
    /// The iterator is cheap to rebuild, so the same range can be walked again
    /// with identical results.
    pub fn iter(&self) -> Ipv4RangeIter {
        Ipv4RangeIter {
            inner: u32::from(self.start_addr)..=u32::from(self.end_addr),
        }
    }
}

impl IntoIterator for Ipv4Range {
    type Item = Ipv4Addr;
    type IntoIter = Ipv4RangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for &Ipv4Range {
    type Item = Ipv4Addr;
    type IntoIter = Ipv4RangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Ipv4RangeIter {
    inner: RangeInclusive<u32>,
}

impl Iterator for Ipv4RangeIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Ipv4Addr::from)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Ipv4RangeIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(Ipv4Addr::from)
    }
}

/// Creates a range from an IP and a CIDR prefix (e.g., 192.168.1.0/24).
///
/// Returns the range covering the entire network block.
pub fn cidr_range(ip: Ipv4Addr, prefix: u8) -> Result<Ipv4Range, RangeError> {
    if prefix > 32 {
        return Err(RangeError::InvalidPrefix(prefix));
    }
    let ip_u32 = u32::from(ip);
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    let network = ip_u32 & mask;
    let broadcast = network | !mask;
    Ipv4Range::new(Ipv4Addr::from(network), Ipv4Addr::from(broadcast))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
