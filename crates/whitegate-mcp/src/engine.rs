//! Protocol engine
//!
//! Turns input lines into response lines. One JSON value (or array) per
//! line; requests get exactly one response, notifications get none, and a
//! batch collapses to a single array line (or nothing, when every element
//! was a notification).
//!
//! Lifecycle: `Uninitialized` until the first `initialize` request, `Ready`
//! after the `initialized` notification. Requests other than `initialize`
//! while uninitialized are rejected with -32002; once `initialize` has been
//! answered the server is operational even if the notification never
//! arrives.
//!
//! This is the only layer that downgrades unexpected failures into -32603
//! responses; crashing mid-stream would break the one-response-per-request
//! contract for the rest of a batch.

use std::collections::HashSet;

use serde_json::{Value, json};

use crate::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, RequestId,
    Response, SERVER_NOT_INITIALIZED,
};
use crate::schema;
use crate::tools::{self, ToolContext, ToolError, ToolName};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "whitegate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
}

/// Closed dispatch table. Unknown method names fall through to the runtime
/// "method not found" response; everything known is an enum case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Initialize,
    NotifyInitialized,
    ToolsList,
    ToolsCall,
    ResourcesList,
    PromptsList,
    Tool(ToolName),
}

impl Method {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "notifications/initialized" => Some(Self::NotifyInitialized),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "resources/list" => Some(Self::ResourcesList),
            "prompts/list" => Some(Self::PromptsList),
            other => ToolName::parse(other).map(Self::Tool),
        }
    }
}

pub struct Engine {
    ctx: ToolContext,
    lifecycle: Lifecycle,
    seen_ids: HashSet<RequestId>,
}

impl Engine {
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            ctx,
            lifecycle: Lifecycle::Uninitialized,
            seen_ids: HashSet::new(),
        }
    }

    /// Process one input line; `None` means nothing is written back.
    pub async fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable input line");
                let response =
                    Response::error(None, PARSE_ERROR, "Parse error", Some(json!({"detail": e.to_string()})));
                return serde_json::to_string(&response).ok();
            }
        };

        match value {
            Value::Array(items) => {
                let mut responses = Vec::new();
                for item in items {
                    if let Some(response) = self.handle_value(item).await {
                        responses.push(response);
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    serde_json::to_string(&responses).ok()
                }
            }
            single => {
                let response = self.handle_value(single).await?;
                serde_json::to_string(&response).ok()
            }
        }
    }

    /// Process one message. Classification is by usable id: a message
    /// without one is a notification and never produces output, whatever
    /// else is wrong with it.
    async fn handle_value(&mut self, value: Value) -> Option<Response> {
        let Value::Object(message) = value else {
            tracing::debug!("ignoring non-object message");
            return None;
        };

        let id = match message.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(n) => Some(RequestId::Number(n)),
                None => {
                    return Some(Response::error(
                        None,
                        INVALID_REQUEST,
                        "request id must be a string or an integer",
                        None,
                    ));
                }
            },
            Some(Value::String(s)) => Some(RequestId::String(s.clone())),
            Some(_) => {
                return Some(Response::error(
                    None,
                    INVALID_REQUEST,
                    "request id must be a string or an integer",
                    None,
                ));
            }
        };

        let jsonrpc_ok = message.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
        let method = message.get("method").and_then(Value::as_str);

        let Some(id) = id else {
            match method {
                Some("notifications/initialized") => {
                    self.lifecycle = Lifecycle::Ready;
                    tracing::debug!("client reported initialized");
                }
                Some(other) => tracing::debug!(method = other, "ignoring notification"),
                None => tracing::debug!("ignoring notification without a method"),
            }
            return None;
        };

        if !jsonrpc_ok {
            return Some(Response::error(
                Some(&id),
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
                None,
            ));
        }

        let Some(method) = method.map(str::to_string) else {
            return Some(Response::error(Some(&id), INVALID_REQUEST, "missing method", None));
        };

        if !self.seen_ids.insert(id.clone()) {
            return Some(Response::error(
                Some(&id),
                INVALID_REQUEST,
                format!("duplicate request id: {id}"),
                None,
            ));
        }

        let params = message.get("params").cloned().unwrap_or(Value::Null);
        Some(self.handle_request(id, &method, params).await)
    }

    async fn handle_request(&mut self, id: RequestId, method: &str, params: Value) -> Response {
        if self.lifecycle == Lifecycle::Uninitialized && method != "initialize" {
            return Response::error(
                Some(&id),
                SERVER_NOT_INITIALIZED,
                "server not initialized: send initialize first",
                None,
            );
        }

        let Some(method) = Method::parse(method) else {
            return Response::error(
                Some(&id),
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
                None,
            );
        };

        match method {
            Method::Initialize => {
                if self.lifecycle == Lifecycle::Uninitialized {
                    self.lifecycle = Lifecycle::Initializing;
                }
                Response::success(
                    &id,
                    json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": {"tools": {}},
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "version": env!("CARGO_PKG_VERSION"),
                        },
                    }),
                )
            }
            Method::NotifyInitialized => {
                // Sent as a request instead of a notification: apply the
                // state change and acknowledge with an empty result.
                self.lifecycle = Lifecycle::Ready;
                Response::success(&id, json!({}))
            }
            Method::ToolsList => Response::success(&id, schema::tool_catalog()),
            Method::ResourcesList => Response::success(&id, json!({"resources": []})),
            Method::PromptsList => Response::success(&id, json!({"prompts": []})),
            Method::ToolsCall => self.handle_tools_call(id, params).await,
            Method::Tool(tool) => {
                let result = tools::dispatch(&self.ctx, tool, &params).await;
                tool_response(&id, result)
            }
        }
    }

    async fn handle_tools_call(&mut self, id: RequestId, params: Value) -> Response {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return Response::error(
                Some(&id),
                INVALID_PARAMS,
                "Missing required parameter: name",
                Some(json!({"field": "name"})),
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let result = tools::call_tool(&self.ctx, name, &arguments).await;
        tool_response(&id, result)
    }
}

fn tool_response(id: &RequestId, result: Result<Value, ToolError>) -> Response {
    match result {
        Ok(value) => Response::success(id, value),
        Err(ToolError::UnknownTool(name)) => Response::error(
            Some(id),
            METHOD_NOT_FOUND,
            format!("Tool not found: {name}"),
            None,
        ),
        Err(ToolError::InvalidParams { message, field }) => Response::error(
            Some(id),
            INVALID_PARAMS,
            message,
            field.map(|f| json!({"field": f})),
        ),
        Err(ToolError::Internal(detail)) => Response::error(
            Some(id),
            INTERNAL_ERROR,
            "Internal error",
            Some(json!({"detail": detail})),
        ),
    }
}
