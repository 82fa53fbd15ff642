//! Rule reconciliation
//!
//! Decides which provider mutations a whitelist operation needs, given a
//! fresh snapshot fetched through a [`RuleClient`]. Add is idempotent both
//! against the snapshot and against the provider's own duplicate detection;
//! remove is set-based and reports per-rule outcomes.

use ipnetwork::IpNetwork;
use serde::Serialize;

use whitegate_core::{ExistingRule, PortRange, Protocol, RuleSpec};

use crate::client::{AuthorizeOutcome, RuleClient};
use crate::error::{CloudError, Result};

/// Filter for removal. Absent fields act as wildcards; a filter with no
/// fields at all is rejected rather than matching everything.
#[derive(Debug, Clone, Default)]
pub struct RemovalFilter {
    pub cidr: Option<IpNetwork>,
    pub ports: Option<PortRange>,
    /// Only constrains when explicitly given. A wildcard value matches only
    /// wildcard entries, never a specific protocol.
    pub protocol: Option<Protocol>,
}

impl RemovalFilter {
    pub fn is_empty(&self) -> bool {
        self.cidr.is_none() && self.ports.is_none() && self.protocol.is_none()
    }

    pub fn matches(&self, rule: &ExistingRule) -> bool {
        if let Some(cidr) = &self.cidr {
            if rule.cidr != cidr.to_string() {
                return false;
            }
        }
        if let Some(ports) = &self.ports {
            if rule.ports != Some(*ports) {
                return false;
            }
        }
        if let Some(protocol) = &self.protocol {
            if rule.protocol != *protocol {
                return false;
            }
        }
        true
    }
}

/// Outcome of an add operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Created { rule_id: Option<String> },
    /// Exact (CIDR, port, protocol) entry was already present; nothing sent,
    /// or the provider reported a duplicate from a concurrent add.
    AlreadyPresent,
}

/// One rule the remove pass failed to revoke
#[derive(Debug, Clone, Serialize)]
pub struct FailedRemoval {
    pub rule: ExistingRule,
    pub error: String,
}

/// Per-rule removal report. Partial failure is reported as such, never
/// collapsed into a single boolean.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemovalReport {
    pub removed: Vec<ExistingRule>,
    pub failed: Vec<FailedRemoval>,
}

impl RemovalReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a check operation
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub whitelisted: bool,
    pub rule: Option<ExistingRule>,
}

/// Reconciler over one provider client. Stateless; each method fetches its
/// own snapshot.
pub struct Reconciler<'a> {
    client: &'a dyn RuleClient,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn RuleClient) -> Self {
        Self { client }
    }

    /// Idempotent add: an exact match in the snapshot short-circuits to
    /// success without a mutation, and a duplicate answer from the provider
    /// (lost race) is also success.
    pub async fn add(&self, spec: &RuleSpec) -> Result<AddOutcome> {
        let existing = self.client.describe_rules(&spec.group_id).await?;
        if existing.iter().any(|rule| rule.matches_spec(spec)) {
            tracing::debug!(group = %spec.group_id, cidr = %spec.cidr, "rule already present, no-op");
            return Ok(AddOutcome::AlreadyPresent);
        }

        match self.client.authorize(&spec.group_id, spec).await? {
            AuthorizeOutcome::Created { rule_id } => {
                tracing::info!(group = %spec.group_id, cidr = %spec.cidr, ports = %spec.ports, "rule added");
                Ok(AddOutcome::Created { rule_id })
            }
            AuthorizeOutcome::AlreadyExists => Ok(AddOutcome::AlreadyPresent),
        }
    }

    /// Set-based remove: every snapshot entry matching the filter gets one
    /// revoke call. An empty match set is success with zero removed. A revoke
    /// that races to "not found" counts as removed.
    pub async fn remove(&self, group_id: &str, filter: &RemovalFilter) -> Result<RemovalReport> {
        if filter.is_empty() {
            return Err(CloudError::EmptyFilter);
        }

        let existing = self.client.describe_rules(group_id).await?;
        let mut report = RemovalReport::default();

        for rule in existing.into_iter().filter(|r| filter.matches(r)) {
            match self.client.revoke(group_id, &rule).await {
                Ok(()) => {
                    tracing::info!(group = group_id, cidr = %rule.cidr, "rule removed");
                    report.removed.push(rule);
                }
                Err(CloudError::RuleNotFound(_)) => {
                    tracing::debug!(group = group_id, cidr = %rule.cidr, "rule vanished before revoke");
                    report.removed.push(rule);
                }
                Err(e) => {
                    tracing::error!(group = group_id, cidr = %rule.cidr, error = %e, "revoke failed");
                    report.failed.push(FailedRemoval {
                        rule,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Read-only snapshot of the target resource
    pub async fn list(&self, group_id: &str) -> Result<Vec<ExistingRule>> {
        self.client.describe_rules(group_id).await
    }

    /// Same exact-match predicate as add, without mutation
    pub async fn check(&self, group_id: &str, spec: &RuleSpec) -> Result<CheckOutcome> {
        let existing = self.client.describe_rules(group_id).await?;
        let rule = existing.into_iter().find(|rule| rule.matches_spec(spec));
        Ok(CheckOutcome {
            whitelisted: rule.is_some(),
            rule,
        })
    }
}
