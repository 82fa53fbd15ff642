//! Pure input validators
//!
//! CIDR normalization and port/alias resolution. These run before anything
//! touches the network, so a bad request is rejected without a provider call.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::error::{Result, ValidationError};
use crate::rule::PortRange;

/// Well-known service aliases accepted wherever a port is expected
const NAMED_PORTS: &[(&str, u16)] = &[
    ("ssh", 22),
    ("telnet", 23),
    ("smtp", 25),
    ("http", 80),
    ("https", 443),
    ("mysql", 3306),
    ("rdp", 3389),
    ("postgresql", 5432),
    ("mongodb", 27017),
];

/// Named port ranges
const NAMED_RANGES: &[(&str, u16, u16)] = &[("ephemeral", 49152, 65535)];

/// Normalize an IP or CIDR string to a network.
///
/// A bare IPv4 address becomes a /32, a bare IPv6 address a /128. CIDR input
/// is validated but otherwise kept as given; comparison downstream is exact,
/// so `10.0.0.0/24` and `10.0.0.0/16` stay distinct.
pub fn normalize_cidr(input: &str) -> Result<IpNetwork> {
    let input = input.trim();
    if input.contains('/') {
        return input
            .parse::<IpNetwork>()
            .map_err(|_| ValidationError::InvalidCidr(input.to_string()));
    }
    let addr: IpAddr = input
        .parse()
        .map_err(|_| ValidationError::InvalidCidr(input.to_string()))?;
    let prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNetwork::new(addr, prefix).map_err(|_| ValidationError::InvalidCidr(input.to_string()))
}

/// Validate a numeric port value
pub fn port_from_number(n: i64) -> Result<PortRange> {
    if !(1..=65535).contains(&n) {
        return Err(ValidationError::PortOutOfRange(n));
    }
    PortRange::single(n as u16)
}

/// Resolve a service alias to a port range.
///
/// Config-provided mappings take precedence over the builtin table; named
/// ranges come last. Returns `None` for unknown names so the caller can fall
/// through to the numeric-bounds error.
pub fn resolve_port_name(name: &str, extra: &[(String, u16)]) -> Option<PortRange> {
    let lower = name.to_ascii_lowercase();
    if let Some((_, port)) = extra.iter().find(|(n, _)| n.eq_ignore_ascii_case(&lower)) {
        return PortRange::single(*port).ok();
    }
    if let Some((_, port)) = NAMED_PORTS.iter().find(|(n, _)| *n == lower) {
        return PortRange::single(*port).ok();
    }
    if let Some((_, from, to)) = NAMED_RANGES.iter().find(|(n, _, _)| *n == lower) {
        return PortRange::new(*from, *to).ok();
    }
    None
}

/// Parse a port given as a string: numeric first, then the alias tables.
pub fn parse_port(input: &str, extra: &[(String, u16)]) -> Result<PortRange> {
    let input = input.trim();
    if let Ok(n) = input.parse::<i64>() {
        return port_from_number(n);
    }
    resolve_port_name(input, extra).ok_or_else(|| ValidationError::InvalidPort(input.to_string()))
}
