//! Packet construction and parsing for the probes `sweepr` sends.

pub mod dns;
pub mod icmp;
