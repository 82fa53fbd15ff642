//! Validation error types

use thiserror::Error;

/// Errors produced by the pure input validators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid IP or CIDR: {0}")]
    InvalidCidr(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("port out of range (1-65535): {0}")]
    PortOutOfRange(i64),

    #[error("invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("invalid protocol: {0} (expected tcp, udp, icmp or all)")]
    InvalidProtocol(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
