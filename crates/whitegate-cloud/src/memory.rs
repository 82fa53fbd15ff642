//! In-memory rule client
//!
//! Backs the reconciler and tool-handler tests. Mirrors the AWS adapter's
//! contract: authorize reports `AlreadyExists` for exact duplicates, revoke
//! fails with `RuleNotFound` for absent rules, and failures can be injected
//! per rule.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use whitegate_core::{ExistingRule, PortRange, RuleSpec};

use crate::client::{AuthStatus, AuthorizeOutcome, RuleClient};
use crate::error::{CloudError, Result};

#[derive(Default)]
pub struct InMemoryRuleClient {
    groups: Mutex<HashMap<String, Vec<ExistingRule>>>,
    fail_revoke: Mutex<Vec<(String, Option<PortRange>)>>,
    duplicate_on_authorize: AtomicBool,
    deny_authorization: AtomicBool,
    next_id: AtomicU64,
}

impl InMemoryRuleClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rule set of a group
    pub fn seed(&self, group_id: &str, rules: Vec<ExistingRule>) {
        self.groups.lock().unwrap().insert(group_id.to_string(), rules);
    }

    /// Snapshot for assertions
    pub fn rules_in(&self, group_id: &str) -> Vec<ExistingRule> {
        self.groups.lock().unwrap().get(group_id).cloned().unwrap_or_default()
    }

    /// Make revoke fail for the given (cidr, port) with a provider error
    pub fn fail_revoke_for(&self, cidr: &str, port: u16) {
        self.fail_revoke
            .lock()
            .unwrap()
            .push((cidr.to_string(), PortRange::single(port).ok()));
    }

    /// Make the next authorize answer "duplicate" regardless of state,
    /// simulating a concurrent add between describe and authorize
    pub fn inject_duplicate_on_authorize(&self) {
        self.duplicate_on_authorize.store(true, Ordering::SeqCst);
    }

    /// Make authorize fail with an authorization (permission) error
    pub fn deny_authorization(&self) {
        self.deny_authorization.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RuleClient for InMemoryRuleClient {
    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::ok("arn:aws:iam::000000000000:user/test"))
    }

    async fn describe_rules(&self, group_id: &str) -> Result<Vec<ExistingRule>> {
        Ok(self.rules_in(group_id))
    }

    async fn authorize(&self, group_id: &str, spec: &RuleSpec) -> Result<AuthorizeOutcome> {
        if self.deny_authorization.load(Ordering::SeqCst) {
            return Err(CloudError::AuthorizationDenied(
                "not authorized to perform ec2:AuthorizeSecurityGroupIngress".to_string(),
            ));
        }
        if self.duplicate_on_authorize.swap(false, Ordering::SeqCst) {
            return Ok(AuthorizeOutcome::AlreadyExists);
        }

        let mut groups = self.groups.lock().unwrap();
        let rules = groups.entry(group_id.to_string()).or_default();
        if rules.iter().any(|r| r.matches_spec(spec)) {
            return Ok(AuthorizeOutcome::AlreadyExists);
        }

        let rule_id = format!("sgr-{:08x}", self.next_id.fetch_add(1, Ordering::SeqCst));
        rules.push(ExistingRule {
            cidr: spec.cidr_string(),
            ports: Some(spec.ports),
            protocol: spec.protocol,
            description: spec.description.clone(),
            rule_id: Some(rule_id.clone()),
        });
        Ok(AuthorizeOutcome::Created { rule_id: Some(rule_id) })
    }

    async fn revoke(&self, group_id: &str, rule: &ExistingRule) -> Result<()> {
        let failing = self
            .fail_revoke
            .lock()
            .unwrap()
            .iter()
            .any(|(cidr, ports)| *cidr == rule.cidr && *ports == rule.ports);
        if failing {
            return Err(CloudError::ApiError("injected revoke failure".to_string()));
        }

        let mut groups = self.groups.lock().unwrap();
        let rules = groups.entry(group_id.to_string()).or_default();
        let before = rules.len();
        rules.retain(|r| {
            !(r.cidr == rule.cidr && r.ports == rule.ports && r.protocol == rule.protocol)
        });
        if rules.len() == before {
            return Err(CloudError::RuleNotFound(format!(
                "{} {} {}",
                rule.cidr,
                rule.ports.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                rule.protocol
            )));
        }
        Ok(())
    }
}
