//! Provider client abstraction
//!
//! `RuleClient` is the thin adapter every provider backend implements. It
//! translates between the rule model and the provider wire shapes and maps
//! provider error codes into the `CloudError` taxonomy. It performs no
//! reconciliation; that is the reconciler's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use whitegate_core::{ExistingRule, RuleSpec};

use crate::credentials::Credentials;
use crate::error::Result;

/// Result of the per-request identity check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub account_info: Option<String>,
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of an authorize call. A provider-side duplicate is a normal
/// outcome here, not an error; add is idempotent end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    Created { rule_id: Option<String> },
    AlreadyExists,
}

/// Thin provider adapter for a single firewall resource kind
#[async_trait]
pub trait RuleClient: Send + Sync {
    /// Lightweight who-am-I call, run once per request before any mutation
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Fresh ingress snapshot for the target resource
    async fn describe_rules(&self, group_id: &str) -> Result<Vec<ExistingRule>>;

    /// Create one ingress entry
    async fn authorize(&self, group_id: &str, spec: &RuleSpec) -> Result<AuthorizeOutcome>;

    /// Delete one ingress entry
    async fn revoke(&self, group_id: &str, rule: &ExistingRule) -> Result<()>;
}

#[async_trait]
impl<T: RuleClient + ?Sized> RuleClient for std::sync::Arc<T> {
    async fn check_auth(&self) -> Result<AuthStatus> {
        (**self).check_auth().await
    }

    async fn describe_rules(&self, group_id: &str) -> Result<Vec<ExistingRule>> {
        (**self).describe_rules(group_id).await
    }

    async fn authorize(&self, group_id: &str, spec: &RuleSpec) -> Result<AuthorizeOutcome> {
        (**self).authorize(group_id, spec).await
    }

    async fn revoke(&self, group_id: &str, rule: &ExistingRule) -> Result<()> {
        (**self).revoke(group_id, rule).await
    }
}

/// Builds a client from per-request credentials. Factories hold no state
/// beyond static configuration; every request gets its own client.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RuleClient>>;
}
