//! Ingress rule model
//!
//! `RuleSpec` is the desired state carried by a single request; `ExistingRule`
//! is a provider-reported snapshot entry. Both live for one operation only.

use ipnetwork::IpNetwork;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, ValidationError};

/// IP protocol of an ingress rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Icmp,
    /// Wildcard entry (`-1` on the AWS wire). Matches only other wildcard
    /// entries, never a specific protocol.
    All,
}

impl Protocol {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "icmp" => Ok(Protocol::Icmp),
            "all" | "-1" => Ok(Protocol::All),
            _ => Err(ValidationError::InvalidProtocol(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
            Self::All => "all",
        }
    }

    /// Wire value used by the AWS API
    pub fn aws_value(&self) -> &'static str {
        match self {
            Self::All => "-1",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Protocol::parse(&s).map_err(D::Error::custom)
    }
}

/// Inclusive port range; a single port is `from == to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn new(from: u16, to: u16) -> Result<Self> {
        if from == 0 {
            return Err(ValidationError::PortOutOfRange(0));
        }
        if from > to {
            return Err(ValidationError::InvalidPortRange(format!("{from}-{to}")));
        }
        Ok(Self { from, to })
    }

    pub fn single(port: u16) -> Result<Self> {
        Self::new(port, port)
    }

    pub fn is_single(&self) -> bool {
        self.from == self.to
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// Desired ingress entry for one whitelist operation
#[derive(Debug, Clone, Serialize)]
pub struct RuleSpec {
    /// Target security group
    pub group_id: String,
    /// Normalized CIDR (bare IPv4 input becomes /32, bare IPv6 /128)
    pub cidr: IpNetwork,
    pub ports: PortRange,
    pub protocol: Protocol,
    pub description: Option<String>,
}

impl RuleSpec {
    /// Canonical CIDR string used for exact comparison against provider data
    pub fn cidr_string(&self) -> String {
        self.cidr.to_string()
    }
}

/// Provider-reported ingress entry, valid for one reconciliation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRule {
    /// CIDR as the provider reports it
    pub cidr: String,
    /// Absent for rules that cover all traffic (e.g. protocol wildcard)
    pub ports: Option<PortRange>,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provider-assigned identifier when the API exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl ExistingRule {
    /// Exact-match predicate shared by add and check: CIDR compared as
    /// normalized strings (no subnet containment), port range and protocol
    /// compared for equality. A wildcard protocol only ever equals another
    /// wildcard.
    pub fn matches_spec(&self, spec: &RuleSpec) -> bool {
        self.cidr == spec.cidr_string()
            && self.ports == Some(spec.ports)
            && self.protocol == spec.protocol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::normalize_cidr;

    fn spec(cidr: &str, port: u16, protocol: Protocol) -> RuleSpec {
        RuleSpec {
            group_id: "sg-12345678".to_string(),
            cidr: normalize_cidr(cidr).unwrap(),
            ports: PortRange::single(port).unwrap(),
            protocol,
            description: None,
        }
    }

    fn existing(cidr: &str, port: u16, protocol: Protocol) -> ExistingRule {
        ExistingRule {
            cidr: cidr.to_string(),
            ports: Some(PortRange::single(port).unwrap()),
            protocol,
            description: None,
            rule_id: None,
        }
    }

    #[test]
    fn protocol_parse_accepts_wire_wildcard() {
        assert_eq!(Protocol::parse("-1").unwrap(), Protocol::All);
        assert_eq!(Protocol::parse("all").unwrap(), Protocol::All);
        assert_eq!(Protocol::parse("TCP").unwrap(), Protocol::Tcp);
        assert!(Protocol::parse("gre").is_err());
    }

    #[test]
    fn protocol_aws_value_round_trip() {
        assert_eq!(Protocol::All.aws_value(), "-1");
        assert_eq!(Protocol::parse(Protocol::All.aws_value()).unwrap(), Protocol::All);
        assert_eq!(Protocol::Udp.aws_value(), "udp");
    }

    #[test]
    fn port_range_rejects_zero_and_inverted() {
        assert!(PortRange::new(0, 22).is_err());
        assert!(PortRange::new(443, 80).is_err());
        assert!(PortRange::new(80, 443).is_ok());
    }

    #[test]
    fn exact_match_requires_all_three_fields() {
        let s = spec("1.2.3.4", 22, Protocol::Tcp);
        assert!(existing("1.2.3.4/32", 22, Protocol::Tcp).matches_spec(&s));
        assert!(!existing("1.2.3.4/32", 443, Protocol::Tcp).matches_spec(&s));
        assert!(!existing("1.2.3.5/32", 22, Protocol::Tcp).matches_spec(&s));
        assert!(!existing("1.2.3.4/32", 22, Protocol::Udp).matches_spec(&s));
    }

    #[test]
    fn no_subnet_containment() {
        let s = spec("10.0.0.0/24", 22, Protocol::Tcp);
        assert!(!existing("10.0.0.0/16", 22, Protocol::Tcp).matches_spec(&s));
        assert!(existing("10.0.0.0/24", 22, Protocol::Tcp).matches_spec(&s));
    }

    #[test]
    fn wildcard_protocol_never_matches_specific() {
        let s = spec("1.2.3.4", 22, Protocol::All);
        assert!(!existing("1.2.3.4/32", 22, Protocol::Tcp).matches_spec(&s));
        assert!(existing("1.2.3.4/32", 22, Protocol::All).matches_spec(&s));
    }

    #[test]
    fn portless_rule_never_equals_a_spec() {
        let s = spec("1.2.3.4", 22, Protocol::Tcp);
        let mut r = existing("1.2.3.4/32", 22, Protocol::Tcp);
        r.ports = None;
        assert!(!r.matches_spec(&s));
    }
}
