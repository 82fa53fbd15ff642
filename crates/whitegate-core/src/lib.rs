//! Whitegate core model
//!
//! Leaf crate holding the rule data model and the pure input validators.
//! Nothing here performs I/O; the cloud and protocol crates build on top.

pub mod error;
pub mod rule;
pub mod validate;

pub use error::{Result, ValidationError};
pub use rule::{ExistingRule, PortRange, Protocol, RuleSpec};
pub use validate::{normalize_cidr, parse_port, port_from_number, resolve_port_name};
