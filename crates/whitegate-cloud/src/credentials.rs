//! Per-request credentials and the ordered source chain
//!
//! Credentials are transient: built for one tool invocation, dropped with it.
//! Resolution walks an ordered list of sources and stops at the first hit;
//! there is no cached or ambient credential state.

use std::fmt;

/// Provider authentication material for a single request
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("region", &self.region)
            .finish()
    }
}

/// A single place credentials may come from
pub trait CredentialSource {
    fn name(&self) -> &'static str;
    fn try_resolve(&self) -> Option<Credentials>;
}

/// Credentials supplied inline with the request
pub struct ExplicitSource(pub Option<Credentials>);

impl CredentialSource for ExplicitSource {
    fn name(&self) -> &'static str {
        "request"
    }

    fn try_resolve(&self) -> Option<Credentials> {
        self.0.clone()
    }
}

/// Standard AWS environment variables
pub struct EnvSource {
    /// Region used when the environment names none
    pub fallback_region: String,
}

impl CredentialSource for EnvSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn try_resolve(&self) -> Option<Credentials> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return None;
        }
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| self.fallback_region.clone());
        Some(Credentials {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok().filter(|t| !t.is_empty()),
            region,
        })
    }
}

/// A named profile from the config file, already materialized
pub struct ProfileSource(pub Option<Credentials>);

impl CredentialSource for ProfileSource {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn try_resolve(&self) -> Option<Credentials> {
        self.0.clone()
    }
}

/// Walk the sources in order and return the first resolved credentials
pub fn resolve_credentials(sources: &[&dyn CredentialSource]) -> Option<Credentials> {
    for source in sources {
        if let Some(credentials) = source.try_resolve() {
            tracing::debug!(source = source.name(), "credentials resolved");
            return Some(credentials);
        }
    }
    None
}
