use std::net::Ipv4Addr;

use thiserror::Error;

/// A node's stable identifier: its IPv4 address on the selected interface.
/// No other identifier exists anywhere in the protocol.
pub type NodeAddress = Ipv4Addr;

/// Integer derived deterministically from address and netmask. Higher wins
/// ties in the Bully election. Never transmitted on the wire — every node
/// recomputes a peer's priority locally from its address.
pub type Priority = u32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid IPv4 address: {0:?}")]
    InvalidIpv4(String),
}

/// `priority(addr, mask)` = the bitwise AND of `~mask` and `addr`, read as an
/// unsigned big-endian integer (the host-bits of the address).
pub fn priority(addr: NodeAddress, mask: NodeAddress) -> Priority {
    let addr_bits = u32::from(addr);
    let mask_bits = u32::from(mask);
    addr_bits & !mask_bits
}

/// `broadcast(addr, mask)` = `addr | ~mask`.
pub fn broadcast_address(addr: NodeAddress, mask: NodeAddress) -> NodeAddress {
    let addr_bits = u32::from(addr);
    let mask_bits = u32::from(mask);
    NodeAddress::from(addr_bits | !mask_bits)
}

/// `validIPv4(s)` = four dotted octets in `0..255`. Stricter than
/// `Ipv4Addr::from_str`: rejects anything that isn't exactly four
/// numeric, dot-separated octets (no embedded whitespace, no octal/hex
/// forms, no fewer/more parts).
pub fn parse_ipv4(s: &str) -> Result<NodeAddress, AddressError> {
    let parts: Vec<&str> = s.split('.').collect();

    if parts.len() != 4 {
        return Err(AddressError::InvalidIpv4(s.to_string()));
    }

    let mut octets = [0u8; 4];

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::InvalidIpv4(s.to_string()));
        }

        octets[i] = part
            .parse::<u16>()
            .ok()
            .filter(|v| *v <= 255)
            .ok_or_else(|| AddressError::InvalidIpv4(s.to_string()))? as u8;
    }

    Ok(NodeAddress::from(octets))
}

pub fn is_valid_ipv4(s: &str) -> bool {
    parse_ipv4(s).is_ok()
}
