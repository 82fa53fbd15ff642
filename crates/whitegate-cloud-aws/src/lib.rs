//! AWS security-group backend
//!
//! Implements the whitegate `RuleClient` contract on top of the AWS SDK:
//! `describe_security_groups`, `authorize_security_group_ingress`,
//! `revoke_security_group_ingress`, and an STS `get_caller_identity` call as
//! the per-request credential check.

pub mod client;
pub mod convert;
pub mod error;

pub use client::{AwsClientFactory, AwsRuleClient};
pub use error::translate_sdk_error;
