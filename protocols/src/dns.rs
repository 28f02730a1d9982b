use std::net::Ipv4Addr;

use anyhow::Context;
use dns_parser::{Packet, RData, ResponseCode};
use pnet::packet::dns::{MutableDnsPacket, Opcode, Retcode};
use thiserror::Error;

pub const DNS_HDR_LEN: usize = 12;
const TYPE_PTR: u16 = 12;
const CLASS_IN: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("malformed dns message: {0}")]
    Malformed(String),
    #[error("dns message is not a response")]
    NotAResponse,
    #[error("dns server answered {0}")]
    ServerFailure(String),
    #[error("no PTR record in answer")]
    NoPtrRecord,
}

/// `10.0.0.7` → `7.0.0.10.in-addr.arpa`
pub fn reverse_address_to_ptr(addr: &Ipv4Addr) -> String {
    let [a, b, c, d] = addr.octets();
    format!("{d}.{c}.{b}.{a}.in-addr.arpa")
}

pub fn create_ptr_packet(addr: &Ipv4Addr, id: u16) -> anyhow::Result<Vec<u8>> {
    let qname: Vec<u8> = encode_dns_name(&reverse_address_to_ptr(addr));
    let q_fixed_len: usize = 4;
    let total: usize = DNS_HDR_LEN + qname.len() + q_fixed_len;
    let mut buffer: Vec<u8> = vec![0u8; total];

    {
        let mut dns: MutableDnsPacket =
            MutableDnsPacket::new(&mut buffer).context("creating dns header")?;
        dns.set_id(id);
        dns.set_is_response(0);
        dns.set_opcode(Opcode::StandardQuery);
        dns.set_is_authoriative(0);
        dns.set_is_truncated(0);
        dns.set_is_recursion_desirable(1);
        dns.set_is_recursion_available(0);
        dns.set_zero_reserved(0);
        dns.set_is_non_authenticated_data(0);
        dns.set_rcode(Retcode::NoError);
        dns.set_query_count(1);
        dns.set_response_count(0);
        dns.set_authority_rr_count(0);
        dns.set_additional_rr_count(0);
    }

    let mut cursor: usize = DNS_HDR_LEN;
    buffer[cursor..cursor + qname.len()].copy_from_slice(&qname);
    cursor += qname.len();
    buffer[cursor..cursor + 2].copy_from_slice(&TYPE_PTR.to_be_bytes());
    cursor += 2;
    buffer[cursor..cursor + 2].copy_from_slice(&CLASS_IN.to_be_bytes());

    Ok(buffer)
}

/// Returns the transaction id and the first PTR target of a response.
pub fn get_hostname(message: &[u8]) -> Result<(u16, String), DnsError> {
    let packet = Packet::parse(message).map_err(|e| DnsError::Malformed(e.to_string()))?;
    if packet.header.query {
        return Err(DnsError::NotAResponse);
    }
    if !matches!(packet.header.response_code, ResponseCode::NoError) {
        return Err(DnsError::ServerFailure(format!(
            "{:?}",
            packet.header.response_code
        )));
    }

    packet
        .answers
        .iter()
        .find_map(|record| match &record.data {
            RData::PTR(ptr) => Some(ptr.0.to_string()),
            _ => None,
        })
        .map(|name| (packet.header.id, name))
        .ok_or(DnsError::NoPtrRecord)
}

fn encode_dns_name(name: &str) -> Vec<u8> {
    let mut encoded: Vec<u8> = Vec::new();
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    encoded
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
