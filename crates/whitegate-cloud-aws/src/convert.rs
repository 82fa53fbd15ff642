//! Conversions between the rule model and EC2 wire shapes

use aws_sdk_ec2::types::{IpPermission, IpRange, Ipv6Range, SecurityGroup};

use whitegate_core::{ExistingRule, PortRange, Protocol, RuleSpec};

/// Flatten a security group's ingress permissions into rule entries, one per
/// CIDR. Entries whose protocol the model does not cover (protocol numbers,
/// icmpv6) are skipped; whitegate never created them and must not touch them.
pub fn rules_from_group(group: &SecurityGroup) -> Vec<ExistingRule> {
    let mut rules = Vec::new();

    for permission in group.ip_permissions() {
        let raw_protocol = permission.ip_protocol().unwrap_or("tcp");
        let Ok(protocol) = Protocol::parse(raw_protocol) else {
            tracing::debug!(protocol = raw_protocol, "skipping unmodeled protocol entry");
            continue;
        };
        let ports = port_range_of(permission.from_port(), permission.to_port());

        for range in permission.ip_ranges() {
            if let Some(cidr) = range.cidr_ip() {
                rules.push(ExistingRule {
                    cidr: cidr.to_string(),
                    ports,
                    protocol,
                    description: range.description().map(str::to_string),
                    rule_id: None,
                });
            }
        }

        for range in permission.ipv6_ranges() {
            if let Some(cidr) = range.cidr_ipv6() {
                rules.push(ExistingRule {
                    cidr: cidr.to_string(),
                    ports,
                    protocol,
                    description: range.description().map(str::to_string),
                    rule_id: None,
                });
            }
        }
    }

    rules
}

/// EC2 reports -1 (or nothing) for rules that cover all ports
fn port_range_of(from: Option<i32>, to: Option<i32>) -> Option<PortRange> {
    let (from, to) = (from?, to?);
    let from = u16::try_from(from).ok()?;
    let to = u16::try_from(to).ok()?;
    PortRange::new(from, to).ok()
}

/// IpPermission for an authorize call, carrying the rule description
pub fn permission_for_spec(spec: &RuleSpec) -> IpPermission {
    let cidr = spec.cidr_string();
    let builder = IpPermission::builder()
        .ip_protocol(spec.protocol.aws_value())
        .from_port(i32::from(spec.ports.from))
        .to_port(i32::from(spec.ports.to));

    if spec.cidr.is_ipv4() {
        let mut range = IpRange::builder().cidr_ip(cidr);
        if let Some(description) = &spec.description {
            range = range.description(description);
        }
        builder.ip_ranges(range.build()).build()
    } else {
        let mut range = Ipv6Range::builder().cidr_ipv6(cidr);
        if let Some(description) = &spec.description {
            range = range.description(description);
        }
        builder.ipv6_ranges(range.build()).build()
    }
}

/// IpPermission identifying an existing entry for a revoke call. EC2 matches
/// on protocol, ports and CIDR; the description is irrelevant here.
pub fn permission_for_existing(rule: &ExistingRule) -> IpPermission {
    let mut builder = IpPermission::builder().ip_protocol(rule.protocol.aws_value());
    if let Some(ports) = rule.ports {
        builder = builder
            .from_port(i32::from(ports.from))
            .to_port(i32::from(ports.to));
    }

    if rule.cidr.contains(':') {
        builder
            .ipv6_ranges(Ipv6Range::builder().cidr_ipv6(&rule.cidr).build())
            .build()
    } else {
        builder
            .ip_ranges(IpRange::builder().cidr_ip(&rule.cidr).build())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whitegate_core::normalize_cidr;

    fn spec(cidr: &str, port: u16) -> RuleSpec {
        RuleSpec {
            group_id: "sg-12345678".to_string(),
            cidr: normalize_cidr(cidr).unwrap(),
            ports: PortRange::single(port).unwrap(),
            protocol: Protocol::Tcp,
            description: Some("test rule".to_string()),
        }
    }

    #[test]
    fn flattens_v4_and_v6_ranges() {
        let group = SecurityGroup::builder()
            .group_id("sg-12345678")
            .ip_permissions(
                IpPermission::builder()
                    .ip_protocol("tcp")
                    .from_port(22)
                    .to_port(22)
                    .ip_ranges(IpRange::builder().cidr_ip("1.2.3.4/32").description("ssh").build())
                    .ip_ranges(IpRange::builder().cidr_ip("5.6.7.8/32").build())
                    .ipv6_ranges(Ipv6Range::builder().cidr_ipv6("2001:db8::/32").build())
                    .build(),
            )
            .build();

        let rules = rules_from_group(&group);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].cidr, "1.2.3.4/32");
        assert_eq!(rules[0].description.as_deref(), Some("ssh"));
        assert_eq!(rules[2].cidr, "2001:db8::/32");
        assert!(rules.iter().all(|r| r.ports == Some(PortRange::single(22).unwrap())));
    }

    #[test]
    fn wildcard_permission_has_no_ports() {
        let group = SecurityGroup::builder()
            .ip_permissions(
                IpPermission::builder()
                    .ip_protocol("-1")
                    .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
                    .build(),
            )
            .build();

        let rules = rules_from_group(&group);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].protocol, Protocol::All);
        assert!(rules[0].ports.is_none());
    }

    #[test]
    fn unmodeled_protocols_are_skipped() {
        let group = SecurityGroup::builder()
            .ip_permissions(
                IpPermission::builder()
                    .ip_protocol("58")
                    .ip_ranges(IpRange::builder().cidr_ip("1.2.3.4/32").build())
                    .build(),
            )
            .build();

        assert!(rules_from_group(&group).is_empty());
    }

    #[test]
    fn spec_permission_uses_v4_range() {
        let permission = permission_for_spec(&spec("1.2.3.4", 443));
        assert_eq!(permission.ip_protocol(), Some("tcp"));
        assert_eq!(permission.from_port(), Some(443));
        assert_eq!(permission.ip_ranges()[0].cidr_ip(), Some("1.2.3.4/32"));
        assert_eq!(permission.ip_ranges()[0].description(), Some("test rule"));
        assert!(permission.ipv6_ranges().is_empty());
    }

    #[test]
    fn spec_permission_uses_v6_range() {
        let permission = permission_for_spec(&spec("2001:db8::1", 443));
        assert!(permission.ip_ranges().is_empty());
        assert_eq!(permission.ipv6_ranges()[0].cidr_ipv6(), Some("2001:db8::1/128"));
    }

    #[test]
    fn wildcard_existing_rule_revokes_without_ports() {
        let rule = ExistingRule {
            cidr: "0.0.0.0/0".to_string(),
            ports: None,
            protocol: Protocol::All,
            description: None,
            rule_id: None,
        };
        let permission = permission_for_existing(&rule);
        assert_eq!(permission.ip_protocol(), Some("-1"));
        assert!(permission.from_port().is_none());
    }
}
