//! Cloud provider error taxonomy
//!
//! `AuthenticationFailed` (identity rejected) and `AuthorizationDenied`
//! (identity valid, action forbidden) are deliberately distinct variants;
//! callers surface them differently.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("rule already exists: {0}")]
    DuplicateRule(String),

    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("provider API error: {0}")]
    ApiError(String),

    #[error("removal filter must specify at least one of ip, port or service")]
    EmptyFilter,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CloudError {
    /// Stable machine-readable code used in tool results
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_error",
            Self::AuthorizationDenied(_) => "authorization_error",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::DuplicateRule(_) => "duplicate_rule",
            Self::RuleNotFound(_) => "rule_not_found",
            Self::Timeout(_) => "timeout",
            Self::ApiError(_) => "provider_error",
            Self::EmptyFilter => "invalid_filter",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
