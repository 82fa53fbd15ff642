//! Declarative tool contracts
//!
//! Each tool's input contract is a data table interpreted by one generic
//! validator; the same table renders the JSON-Schema shape served by
//! `tools/list`. Adding a tool means adding data here, not parsing code.

use serde_json::{Map, Value, json};

/// Accepted value shape for one field
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    String,
    /// Numeric port in [1, 65535]. Aliases are resolved to numbers before
    /// validation, so an unresolved name fails here.
    Port,
    Enum(&'static [&'static str]),
    /// Credentials object; nested fields are checked when the credential
    /// chain materializes them.
    Credentials,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [FieldSpec],
}

const PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "all", "-1"];

const CREDENTIALS_FIELD: FieldSpec = FieldSpec {
    name: "credentials",
    kind: FieldKind::Credentials,
    required: false,
    description: "AWS credentials; falls back to environment, then config profile",
};

const RESOURCE_ID_FIELD: FieldSpec = FieldSpec {
    name: "resource_id",
    kind: FieldKind::String,
    required: true,
    description: "Security group ID (e.g. sg-12345678)",
};

pub const WHITELIST_ADD: ToolSchema = ToolSchema {
    name: "whitelist_add",
    description: "Add an IP address or CIDR to a security group whitelist",
    fields: &[
        CREDENTIALS_FIELD,
        RESOURCE_ID_FIELD,
        FieldSpec {
            name: "ip_address",
            kind: FieldKind::String,
            required: true,
            description: "IP address or CIDR block; \"current\" resolves the caller's public IP",
        },
        FieldSpec {
            name: "port",
            kind: FieldKind::Port,
            required: true,
            description: "Port number or service alias (ssh, https, ...)",
        },
        FieldSpec {
            name: "protocol",
            kind: FieldKind::Enum(PROTOCOLS),
            required: false,
            description: "Protocol (default: tcp)",
        },
        FieldSpec {
            name: "description",
            kind: FieldKind::String,
            required: false,
            description: "Description stored on the rule",
        },
        FieldSpec {
            name: "service_name",
            kind: FieldKind::String,
            required: false,
            description: "Service name recorded in the generated description",
        },
    ],
};

pub const WHITELIST_REMOVE: ToolSchema = ToolSchema {
    name: "whitelist_remove",
    description: "Remove whitelist rules by IP, port/service, or both",
    fields: &[
        CREDENTIALS_FIELD,
        RESOURCE_ID_FIELD,
        FieldSpec {
            name: "ip_address",
            kind: FieldKind::String,
            required: false,
            description: "IP address or CIDR to remove (optional)",
        },
        FieldSpec {
            name: "port",
            kind: FieldKind::Port,
            required: false,
            description: "Port number to remove (optional)",
        },
        FieldSpec {
            name: "service_name",
            kind: FieldKind::String,
            required: false,
            description: "Service alias to remove (optional)",
        },
        FieldSpec {
            name: "protocol",
            kind: FieldKind::Enum(PROTOCOLS),
            required: false,
            description: "Only remove rules with this protocol",
        },
    ],
};

pub const WHITELIST_LIST: ToolSchema = ToolSchema {
    name: "whitelist_list",
    description: "List all ingress rules of a security group",
    fields: &[CREDENTIALS_FIELD, RESOURCE_ID_FIELD],
};

pub const WHITELIST_CHECK: ToolSchema = ToolSchema {
    name: "whitelist_check",
    description: "Check whether an IP/port combination is whitelisted",
    fields: &[
        CREDENTIALS_FIELD,
        RESOURCE_ID_FIELD,
        FieldSpec {
            name: "ip_address",
            kind: FieldKind::String,
            required: true,
            description: "IP address or CIDR block to check",
        },
        FieldSpec {
            name: "port",
            kind: FieldKind::Port,
            required: true,
            description: "Port number or service alias to check",
        },
        FieldSpec {
            name: "protocol",
            kind: FieldKind::Enum(PROTOCOLS),
            required: false,
            description: "Protocol (default: tcp)",
        },
    ],
};

pub const ALL_TOOLS: &[&ToolSchema] =
    &[&WHITELIST_ADD, &WHITELIST_REMOVE, &WHITELIST_LIST, &WHITELIST_CHECK];

/// A field that failed validation, with the offending field name for the
/// error `data` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Generic validator interpreting a schema table over raw arguments.
/// Unknown extra fields are allowed.
pub fn validate(schema: &ToolSchema, args: &Map<String, Value>) -> Result<(), SchemaViolation> {
    for field in schema.fields {
        let Some(value) = args.get(field.name) else {
            if field.required {
                return Err(SchemaViolation {
                    field: field.name.to_string(),
                    reason: "missing required parameter".to_string(),
                });
            }
            continue;
        };

        match field.kind {
            FieldKind::String => {
                if !value.is_string() {
                    return Err(SchemaViolation {
                        field: field.name.to_string(),
                        reason: "expected a string".to_string(),
                    });
                }
            }
            FieldKind::Port => validate_port_value(field.name, value)?,
            FieldKind::Enum(allowed) => match value.as_str() {
                Some(s) if allowed.contains(&s) => {}
                _ => {
                    return Err(SchemaViolation {
                        field: field.name.to_string(),
                        reason: format!("expected one of {}", allowed.join(", ")),
                    });
                }
            },
            FieldKind::Credentials => {
                if !value.is_object() {
                    return Err(SchemaViolation {
                        field: field.name.to_string(),
                        reason: "expected an object".to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

/// A port argument is a number in bounds, or a `{from, to}` range object
/// (what a named range like `ephemeral` resolves to). Anything else is
/// rejected here, including alias strings that failed to resolve.
fn validate_port_value(field: &str, value: &Value) -> Result<(), SchemaViolation> {
    let out_of_range = |port: i64| SchemaViolation {
        field: field.to_string(),
        reason: format!("port out of range (1-65535): {port}"),
    };

    match value {
        Value::Number(n) => match n.as_i64() {
            Some(port) if (1..=65535).contains(&port) => Ok(()),
            Some(port) => Err(out_of_range(port)),
            None => Err(SchemaViolation {
                field: field.to_string(),
                reason: format!("invalid port: {value}"),
            }),
        },
        Value::Object(range) => {
            let bound = |key: &str| range.get(key).and_then(Value::as_i64);
            match (bound("from"), bound("to")) {
                (Some(from), Some(to)) if (1..=65535).contains(&from) && (1..=65535).contains(&to) && from <= to => {
                    Ok(())
                }
                (Some(from), _) if !(1..=65535).contains(&from) => Err(out_of_range(from)),
                (_, Some(to)) if !(1..=65535).contains(&to) => Err(out_of_range(to)),
                _ => Err(SchemaViolation {
                    field: field.to_string(),
                    reason: format!("invalid port range: {value}"),
                }),
            }
        }
        _ => Err(SchemaViolation {
            field: field.to_string(),
            reason: format!("invalid port: {value}"),
        }),
    }
}

/// Render the JSON-Schema input contract served by `tools/list`
pub fn input_schema(schema: &ToolSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in schema.fields {
        let shape = match field.kind {
            FieldKind::String => json!({
                "type": "string",
                "description": field.description,
            }),
            FieldKind::Port => json!({
                "type": ["integer", "string"],
                "minimum": 1,
                "maximum": 65535,
                "description": field.description,
            }),
            FieldKind::Enum(values) => json!({
                "type": "string",
                "enum": values,
                "description": field.description,
            }),
            FieldKind::Credentials => json!({
                "type": "object",
                "description": field.description,
                "properties": {
                    "access_key_id": {"type": "string"},
                    "secret_access_key": {"type": "string"},
                    "session_token": {"type": "string"},
                    "region": {"type": "string"},
                    "profile": {"type": "string", "description": "Named profile from the config file"},
                },
            }),
        };
        properties.insert(field.name.to_string(), shape);
        if field.required {
            required.push(Value::from(field.name));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// The full catalog for `tools/list`
pub fn tool_catalog() -> Value {
    let tools: Vec<Value> = ALL_TOOLS
        .iter()
        .map(|schema| {
            json!({
                "name": schema.name,
                "description": schema.description,
                "inputSchema": input_schema(schema),
            })
        })
        .collect();
    json!({ "tools": tools })
}
