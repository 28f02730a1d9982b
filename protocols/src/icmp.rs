//! ICMPv4 echo packets, built with the IPv4 header included so callers can
//! pick the TTL, and parsing of the replies a sweep or a trace cares about.

use std::net::Ipv4Addr;

use anyhow::Context;
use pnet::packet::{
    Packet,
    icmp::{
        self, IcmpCode, IcmpPacket, IcmpTypes,
        echo_reply::EchoReplyPacket,
        echo_request::{EchoRequestPacket, MutableEchoRequestPacket},
    },
    ip::IpNextHeaderProtocols,
    ipv4::{self, Ipv4Flags, Ipv4Packet, MutableIpv4Packet},
};

pub const IPV4_HDR_LEN: usize = 20;
pub const ICMP_ECHO_HDR_LEN: usize = 8;
/// Same payload size as the classic `ping` default.
pub const DEFAULT_PAYLOAD_LEN: usize = 32;

/// Replies to one of our echo requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcmpReply {
    EchoReply {
        source: Ipv4Addr,
        identifier: u16,
        sequence: u16,
        ttl: u8,
        payload_len: usize,
    },
    /// A router or the target itself reported the destination unreachable.
    Unreachable {
        reporter: Ipv4Addr,
        destination: Ipv4Addr,
        identifier: u16,
        sequence: u16,
    },
    /// A router on the path dropped the request because its TTL ran out.
    TimeExceeded {
        reporter: Ipv4Addr,
        destination: Ipv4Addr,
        identifier: u16,
        sequence: u16,
    },
}

impl IcmpReply {
    pub fn identifier(&self) -> u16 {
        match self {
            IcmpReply::EchoReply { identifier, .. }
            | IcmpReply::Unreachable { identifier, .. }
            | IcmpReply::TimeExceeded { identifier, .. } => *identifier,
        }
    }

    pub fn sequence(&self) -> u16 {
        match self {
            IcmpReply::EchoReply { sequence, .. }
            | IcmpReply::Unreachable { sequence, .. }
            | IcmpReply::TimeExceeded { sequence, .. } => *sequence,
        }
    }

    /// The address the original request was sent to.
    pub fn probed_addr(&self) -> Ipv4Addr {
        match self {
            IcmpReply::EchoReply { source, .. } => *source,
            IcmpReply::Unreachable { destination, .. }
            | IcmpReply::TimeExceeded { destination, .. } => *destination,
        }
    }
}

/// Builds a complete IPv4 packet carrying an ICMP echo request.
///
/// The source address is left unspecified; the kernel fills it in on raw
/// sockets that include the IP header.
pub fn create_echo_request(
    dst_addr: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    ttl: u8,
    payload_len: usize,
) -> anyhow::Result<Vec<u8>> {
    let icmp_len: usize = ICMP_ECHO_HDR_LEN + payload_len;
    let total_len: usize = IPV4_HDR_LEN + icmp_len;
    anyhow::ensure!(total_len <= u16::MAX as usize, "echo payload too large: {payload_len}");

    let mut buffer: Vec<u8> = vec![0u8; total_len];
    {
        let payload: Vec<u8> = (0..payload_len).map(|i| (i % 256) as u8).collect();
        let mut echo: MutableEchoRequestPacket = MutableEchoRequestPacket::new(&mut buffer[IPV4_HDR_LEN..])
            .context("creating icmp echo request")?;
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode::new(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        echo.set_payload(&payload);
        let icmp_view: IcmpPacket = IcmpPacket::new(echo.packet()).context("viewing icmp packet")?;
        let checksum: u16 = icmp::checksum(&icmp_view);
        echo.set_checksum(checksum);
    }
    {
        let mut ip: MutableIpv4Packet =
            MutableIpv4Packet::new(&mut buffer).context("creating ipv4 header")?;
        ip.set_version(4);
        ip.set_header_length((IPV4_HDR_LEN / 4) as u8);
        ip.set_total_length(total_len as u16);
        ip.set_identification(sequence);
        ip.set_flags(Ipv4Flags::DontFragment);
        ip.set_ttl(ttl);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
        ip.set_source(Ipv4Addr::UNSPECIFIED);
        ip.set_destination(dst_addr);
        let checksum: u16 = ipv4::checksum(&ip.to_immutable());
        ip.set_checksum(checksum);
    }
    Ok(buffer)
}

/// Parses a received IPv4 packet. Returns `None` for anything that is not an
/// ICMP reply to an echo request.
pub fn parse_reply(bytes: &[u8]) -> Option<IcmpReply> {
    let ip: Ipv4Packet = Ipv4Packet::new(bytes)?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let icmp_bytes: &[u8] = bytes.get(usize::from(ip.get_header_length()) * 4..)?;
    let icmp: IcmpPacket = IcmpPacket::new(icmp_bytes)?;

    match icmp.get_icmp_type() {
        IcmpTypes::EchoReply => {
            let reply: EchoReplyPacket = EchoReplyPacket::new(icmp_bytes)?;
            Some(IcmpReply::EchoReply {
                source: ip.get_source(),
                identifier: reply.get_identifier(),
                sequence: reply.get_sequence_number(),
                ttl: ip.get_ttl(),
                payload_len: reply.payload().len(),
            })
        }
        IcmpTypes::DestinationUnreachable => {
            let (destination, identifier, sequence) = parse_quoted_echo(icmp.payload())?;
            Some(IcmpReply::Unreachable {
                reporter: ip.get_source(),
                destination,
                identifier,
                sequence,
            })
        }
        IcmpTypes::TimeExceeded => {
            let (destination, identifier, sequence) = parse_quoted_echo(icmp.payload())?;
            Some(IcmpReply::TimeExceeded {
                reporter: ip.get_source(),
                destination,
                identifier,
                sequence,
            })
        }
        _ => None,
    }
}

/// ICMP error messages quote the offending IPv4 header plus the first
/// 8 bytes of its payload, after 4 unused bytes.
fn parse_quoted_echo(icmp_payload: &[u8]) -> Option<(Ipv4Addr, u16, u16)> {
    let quoted: &[u8] = icmp_payload.get(4..)?;
    let inner_ip: Ipv4Packet = Ipv4Packet::new(quoted)?;
    if inner_ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let inner_icmp: &[u8] = quoted.get(usize::from(inner_ip.get_header_length()) * 4..)?;
    let request: EchoRequestPacket = EchoRequestPacket::new(inner_icmp)?;
    if request.get_icmp_type() != IcmpTypes::EchoRequest {
        return None;
    }
    let identifier: u16 = request.get_identifier();
    let sequence: u16 = request.get_sequence_number();
    Some((inner_ip.get_destination(), identifier, sequence))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
