//! AWS rule client
//!
//! Thin adapter over the EC2 and STS SDK clients for a single security
//! group. Built fresh from per-request credentials; nothing outlives the
//! request.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_ec2::config::{Credentials as SdkCredentials, Region};

use whitegate_cloud::{
    AuthStatus, AuthorizeOutcome, ClientFactory, CloudError, Credentials, Result, RuleClient,
};
use whitegate_core::{ExistingRule, RuleSpec};

use crate::convert::{permission_for_existing, permission_for_spec, rules_from_group};
use crate::error::translate_sdk_error;

/// Per-operation deadline; a timed-out call surfaces as a provider error and
/// is never retried here.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AwsRuleClient {
    ec2: aws_sdk_ec2::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsRuleClient {
    /// Build a client from explicit request credentials.
    pub async fn connect(credentials: &Credentials) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(OPERATION_TIMEOUT)
            .build();
        let provider = SdkCredentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            "whitegate",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(provider)
            .timeout_config(timeouts)
            .load()
            .await;

        Self {
            ec2: aws_sdk_ec2::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl RuleClient for AwsRuleClient {
    async fn check_auth(&self) -> Result<AuthStatus> {
        match self.sts.get_caller_identity().send().await {
            Ok(identity) => {
                let arn = identity.arn().unwrap_or("unknown").to_string();
                tracing::debug!(arn = %arn, "credentials verified");
                Ok(AuthStatus::ok(arn))
            }
            Err(err) => match translate_sdk_error(err) {
                // STS rejecting the caller is an authentication failure even
                // when it answers with an access-denied shape.
                CloudError::AuthorizationDenied(msg) | CloudError::AuthenticationFailed(msg) => {
                    Err(CloudError::AuthenticationFailed(msg))
                }
                other => Err(other),
            },
        }
    }

    async fn describe_rules(&self, group_id: &str) -> Result<Vec<ExistingRule>> {
        let response = self
            .ec2
            .describe_security_groups()
            .group_ids(group_id)
            .send()
            .await
            .map_err(translate_sdk_error)?;

        let group = response
            .security_groups()
            .first()
            .ok_or_else(|| CloudError::ResourceNotFound(group_id.to_string()))?;

        Ok(rules_from_group(group))
    }

    async fn authorize(&self, group_id: &str, spec: &RuleSpec) -> Result<AuthorizeOutcome> {
        let result = self
            .ec2
            .authorize_security_group_ingress()
            .group_id(group_id)
            .ip_permissions(permission_for_spec(spec))
            .send()
            .await;

        match result {
            Ok(response) => {
                let rule_id = response
                    .security_group_rules()
                    .first()
                    .and_then(|rule| rule.security_group_rule_id())
                    .map(str::to_string);
                Ok(AuthorizeOutcome::Created { rule_id })
            }
            Err(err) => match translate_sdk_error(err) {
                CloudError::DuplicateRule(_) => Ok(AuthorizeOutcome::AlreadyExists),
                other => Err(other),
            },
        }
    }

    async fn revoke(&self, group_id: &str, rule: &ExistingRule) -> Result<()> {
        self.ec2
            .revoke_security_group_ingress()
            .group_id(group_id)
            .ip_permissions(permission_for_existing(rule))
            .send()
            .await
            .map_err(translate_sdk_error)?;
        Ok(())
    }
}

/// Factory handed to the tool handlers; builds one client per request.
pub struct AwsClientFactory;

#[async_trait]
impl ClientFactory for AwsClientFactory {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RuleClient>> {
        Ok(Box::new(AwsRuleClient::connect(credentials).await))
    }
}
