//! Tool handlers
//!
//! Each handler validates its arguments against the declarative schema,
//! resolves aliases and the `"current"` IP sentinel, walks the credential
//! chain, then delegates to the reconciler. Validation failures become
//! invalid-params protocol errors; provider failures become the tool's
//! `{success: false, error: {...}}` result shape.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};
use thiserror::Error;

use whitegate_cloud::{
    ClientFactory, CloudError, CredentialSource, Credentials, EnvSource, ExplicitSource,
    ProfileSource, Reconciler, RemovalFilter, RuleClient, resolve_credentials,
};
use whitegate_cloud::reconcile::AddOutcome;
use whitegate_config::Config;
use whitegate_core::{PortRange, Protocol, RuleSpec, normalize_cidr, resolve_port_name};

use crate::ip::PublicIpResolver;
use crate::schema::{self, SchemaViolation, ToolSchema};

/// Everything a tool invocation needs; shared immutably across requests
pub struct ToolContext {
    pub config: Config,
    pub factory: Arc<dyn ClientFactory>,
    pub ip_resolver: Arc<dyn PublicIpResolver>,
}

/// Handler-level failures that map onto protocol errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("{message}")]
    InvalidParams {
        message: String,
        field: Option<String>,
    },

    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }
}

impl From<SchemaViolation> for ToolError {
    fn from(violation: SchemaViolation) -> Self {
        Self::InvalidParams {
            message: violation.to_string(),
            field: Some(violation.field),
        }
    }
}

/// Closed set of tools exposed over `tools/call` and as direct methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    Add,
    Remove,
    List,
    Check,
}

impl ToolName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "whitelist_add" => Some(Self::Add),
            "whitelist_remove" => Some(Self::Remove),
            "whitelist_list" => Some(Self::List),
            "whitelist_check" => Some(Self::Check),
            _ => None,
        }
    }

    fn schema(&self) -> &'static ToolSchema {
        match self {
            Self::Add => &schema::WHITELIST_ADD,
            Self::Remove => &schema::WHITELIST_REMOVE,
            Self::List => &schema::WHITELIST_LIST,
            Self::Check => &schema::WHITELIST_CHECK,
        }
    }
}

/// Entry point used by `tools/call`
pub async fn call_tool(ctx: &ToolContext, name: &str, arguments: &Value) -> Result<Value, ToolError> {
    let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
    dispatch(ctx, tool, arguments).await
}

/// Entry point used by the direct `whitelist_*` methods
pub async fn dispatch(ctx: &ToolContext, tool: ToolName, arguments: &Value) -> Result<Value, ToolError> {
    let mut args = arguments.as_object().cloned().unwrap_or_default();
    resolve_port_alias(ctx, &mut args);
    schema::validate(tool.schema(), &args)?;

    match tool {
        ToolName::Add => whitelist_add(ctx, &args).await,
        ToolName::Remove => whitelist_remove(ctx, &args).await,
        ToolName::List => whitelist_list(ctx, &args).await,
        ToolName::Check => whitelist_check(ctx, &args).await,
    }
}

async fn whitelist_add(ctx: &ToolContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let resource_id = required_str(args, "resource_id")?;
    let cidr = resolve_ip(ctx, required_str(args, "ip_address")?).await?;
    let ports = port_range_of(args.get("port")).ok_or_else(|| {
        ToolError::invalid("port", "missing required parameter")
    })?;
    let protocol = protocol_of(ctx, args)?;
    let service_name = optional_str(args, "service_name");
    let description = match optional_str(args, "description") {
        Some(description) => description.to_string(),
        None => render_description(&ctx.config.defaults.description_template, service_name),
    };

    let spec = RuleSpec {
        group_id: resource_id.to_string(),
        cidr,
        ports,
        protocol,
        description: Some(description),
    };

    let credentials = credentials_for(ctx, args)?;
    let client = match establish(ctx, &credentials).await {
        Ok(client) => client,
        Err(err) => return Ok(failure(&err)),
    };

    let reconciler = Reconciler::new(client.as_ref());
    match reconciler.add(&spec).await {
        Ok(AddOutcome::Created { .. }) => Ok(json!({
            "success": true,
            "message": format!("rule added to {resource_id}"),
            "rule": rule_payload(resource_id, &spec),
        })),
        Ok(AddOutcome::AlreadyPresent) => Ok(json!({
            "success": true,
            "message": format!("rule already present in {resource_id}; nothing to do"),
            "rule": rule_payload(resource_id, &spec),
        })),
        Err(err) => Ok(failure(&err)),
    }
}

async fn whitelist_remove(ctx: &ToolContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let resource_id = required_str(args, "resource_id")?;

    let cidr = match optional_str(args, "ip_address") {
        Some(input) => Some(
            normalize_cidr(input).map_err(|e| ToolError::invalid("ip_address", e.to_string()))?,
        ),
        None => None,
    };
    let port = port_range_of(args.get("port"));
    let service = match optional_str(args, "service_name") {
        Some(name) => Some(
            resolve_port_name(name, &ctx.config.port_aliases())
                .ok_or_else(|| ToolError::invalid("service_name", format!("unknown service name: {name}")))?,
        ),
        None => None,
    };

    if cidr.is_none() && port.is_none() && service.is_none() {
        return Err(ToolError::InvalidParams {
            message: "at least one of ip_address, port or service_name is required".to_string(),
            field: None,
        });
    }

    let ports = match (port, service) {
        (Some(p), Some(s)) if p != s => {
            return Err(ToolError::invalid(
                "service_name",
                "service_name and port resolve to different ports",
            ));
        }
        (p, s) => p.or(s),
    };

    // Protocol constrains removal only when the caller asked for it.
    let protocol = match optional_str(args, "protocol") {
        Some(p) => Some(Protocol::parse(p).map_err(|e| ToolError::invalid("protocol", e.to_string()))?),
        None => None,
    };

    let filter = RemovalFilter { cidr, ports, protocol };

    let credentials = credentials_for(ctx, args)?;
    let client = match establish(ctx, &credentials).await {
        Ok(client) => client,
        Err(err) => return Ok(failure(&err)),
    };

    let reconciler = Reconciler::new(client.as_ref());
    match reconciler.remove(resource_id, &filter).await {
        Ok(report) => Ok(json!({
            "success": report.is_success(),
            "removed": report.removed,
            "failed": report.failed,
        })),
        Err(err) => Ok(failure(&err)),
    }
}

async fn whitelist_list(ctx: &ToolContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let resource_id = required_str(args, "resource_id")?;

    let credentials = credentials_for(ctx, args)?;
    let client = match establish(ctx, &credentials).await {
        Ok(client) => client,
        Err(err) => return Ok(failure(&err)),
    };

    let reconciler = Reconciler::new(client.as_ref());
    match reconciler.list(resource_id).await {
        Ok(rules) => Ok(json!({
            "success": true,
            "resource_id": resource_id,
            "count": rules.len(),
            "rules": rules,
        })),
        Err(err) => Ok(failure(&err)),
    }
}

async fn whitelist_check(ctx: &ToolContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let resource_id = required_str(args, "resource_id")?;
    let cidr = resolve_ip(ctx, required_str(args, "ip_address")?).await?;
    let ports = port_range_of(args.get("port"))
        .ok_or_else(|| ToolError::invalid("port", "missing required parameter"))?;
    let protocol = protocol_of(ctx, args)?;

    let spec = RuleSpec {
        group_id: resource_id.to_string(),
        cidr,
        ports,
        protocol,
        description: None,
    };

    let credentials = credentials_for(ctx, args)?;
    let client = match establish(ctx, &credentials).await {
        Ok(client) => client,
        Err(err) => return Ok(failure(&err)),
    };

    let reconciler = Reconciler::new(client.as_ref());
    match reconciler.check(resource_id, &spec).await {
        Ok(outcome) => {
            let mut result = json!({
                "success": true,
                "whitelisted": outcome.whitelisted,
            });
            if let Some(rule) = outcome.rule {
                result["rule"] = serde_json::to_value(rule).unwrap_or(Value::Null);
            }
            Ok(result)
        }
        Err(err) => Ok(failure(&err)),
    }
}

/// Rewrite a string `port` argument through the alias tables before
/// validation. Unknown names are left in place so the generic validator
/// rejects them with the bounds error.
fn resolve_port_alias(ctx: &ToolContext, args: &mut Map<String, Value>) {
    let Some(Value::String(name)) = args.get("port") else {
        return;
    };
    if let Ok(range) = whitegate_core::parse_port(name, &ctx.config.port_aliases()) {
        let resolved = if range.is_single() {
            Value::from(range.from)
        } else {
            json!({"from": range.from, "to": range.to})
        };
        args.insert("port".to_string(), resolved);
    }
}

/// Read a validated port argument back as a range
fn port_range_of(value: Option<&Value>) -> Option<PortRange> {
    match value {
        Some(Value::Number(n)) => {
            let port = u16::try_from(n.as_i64()?).ok()?;
            PortRange::single(port).ok()
        }
        Some(Value::Object(range)) => {
            let from = u16::try_from(range.get("from")?.as_i64()?).ok()?;
            let to = u16::try_from(range.get("to")?.as_i64()?).ok()?;
            PortRange::new(from, to).ok()
        }
        _ => None,
    }
}

fn protocol_of(ctx: &ToolContext, args: &Map<String, Value>) -> Result<Protocol, ToolError> {
    match optional_str(args, "protocol") {
        Some(p) => Protocol::parse(p).map_err(|e| ToolError::invalid("protocol", e.to_string())),
        None => Ok(ctx.config.defaults.protocol),
    }
}

/// Normalize an ip_address argument, resolving the `"current"` sentinel via
/// the public-IP lookup. Lookup failure is a handler-level internal error,
/// not a validation error.
async fn resolve_ip(ctx: &ToolContext, input: &str) -> Result<ipnetwork::IpNetwork, ToolError> {
    if input == "current" {
        let addr = ctx
            .ip_resolver
            .lookup()
            .await
            .map_err(|e| ToolError::Internal(format!("failed to resolve current public IP: {e}")))?;
        return normalize_cidr(&addr.to_string())
            .map_err(|e| ToolError::Internal(format!("public IP lookup returned {addr}: {e}")));
    }
    normalize_cidr(input).map_err(|e| ToolError::invalid("ip_address", e.to_string()))
}

/// Walk the credential chain: request object, then environment, then config
/// profile. The request may also name a profile instead of inlining keys.
fn credentials_for(ctx: &ToolContext, args: &Map<String, Value>) -> Result<Credentials, ToolError> {
    let default_region = ctx.config.defaults.region.clone();

    let mut explicit = None;
    let mut profile_name = None;
    if let Some(value) = args.get("credentials") {
        let obj = value
            .as_object()
            .ok_or_else(|| ToolError::invalid("credentials", "expected an object"))?;
        profile_name = obj.get("profile").and_then(Value::as_str);

        let access_key_id = obj.get("access_key_id").and_then(Value::as_str);
        let secret_access_key = obj.get("secret_access_key").and_then(Value::as_str);
        match (access_key_id, secret_access_key) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                explicit = Some(Credentials {
                    access_key_id: key.to_string(),
                    secret_access_key: secret.to_string(),
                    session_token: obj
                        .get("session_token")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                    region: obj
                        .get("region")
                        .and_then(Value::as_str)
                        .unwrap_or(&default_region)
                        .to_string(),
                });
            }
            (None, None) => {}
            _ => {
                return Err(ToolError::invalid(
                    "credentials",
                    "both access_key_id and secret_access_key are required",
                ));
            }
        }
    }

    let profile = match profile_name {
        Some(name) => Some(ctx.config.profile(name).ok_or_else(|| {
            ToolError::invalid("credentials", format!("unknown credential profile: {name}"))
        })?),
        None => ctx.config.default_profile(),
    };
    let profile_credentials = profile.map(|p| Credentials {
        access_key_id: p.access_key_id.clone(),
        secret_access_key: p.secret_access_key.clone(),
        session_token: p.session_token.clone(),
        region: p.region.clone().unwrap_or_else(|| default_region.clone()),
    });

    let explicit_source = ExplicitSource(explicit);
    let env_source = EnvSource {
        fallback_region: default_region,
    };
    let profile_source = ProfileSource(profile_credentials);
    let sources: [&dyn CredentialSource; 3] = [&explicit_source, &env_source, &profile_source];

    resolve_credentials(&sources).ok_or_else(|| {
        ToolError::invalid(
            "credentials",
            "no credentials available (request, environment, or config profile)",
        )
    })
}

/// Build a client for this request and run the identity check once, before
/// anything that could mutate.
async fn establish(
    ctx: &ToolContext,
    credentials: &Credentials,
) -> std::result::Result<Box<dyn RuleClient>, CloudError> {
    let client = ctx.factory.connect(credentials).await?;
    let status = client.check_auth().await?;
    if !status.authenticated {
        return Err(CloudError::AuthenticationFailed(
            status.error.unwrap_or_else(|| "credentials rejected".to_string()),
        ));
    }
    Ok(client)
}

fn failure(err: &CloudError) -> Value {
    json!({
        "success": false,
        "error": {
            "code": err.code(),
            "message": err.to_string(),
        },
    })
}

fn rule_payload(resource_id: &str, spec: &RuleSpec) -> Value {
    json!({
        "resource_id": resource_id,
        "cidr": spec.cidr_string(),
        "port": port_value(spec.ports),
        "protocol": spec.protocol,
    })
}

fn port_value(ports: PortRange) -> Value {
    if ports.is_single() {
        Value::from(ports.from)
    } else {
        Value::from(ports.to_string())
    }
}

fn render_description(template: &str, service_name: Option<&str>) -> String {
    template
        .replace("{date}", &Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .replace("{service}", service_name.unwrap_or("whitegate"))
}

fn required_str<'a>(args: &'a Map<String, Value>, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid(field, "missing required parameter"))
}

fn optional_str<'a>(args: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    args.get(field).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_template_substitution() {
        let rendered = render_description("{service} via whitegate on {date}", Some("ssh"));
        assert!(rendered.starts_with("ssh via whitegate on "));
        assert!(!rendered.contains("{date}"));
    }

    #[test]
    fn port_range_of_accepts_number_and_object() {
        assert_eq!(
            port_range_of(Some(&json!(443))),
            Some(PortRange::single(443).unwrap())
        );
        assert_eq!(
            port_range_of(Some(&json!({"from": 49152, "to": 65535}))),
            Some(PortRange::new(49152, 65535).unwrap())
        );
        assert_eq!(port_range_of(Some(&json!("https"))), None);
        assert_eq!(port_range_of(None), None);
    }
}
