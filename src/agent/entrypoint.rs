//! Invocation entrypoint around the agent.
//!
//! The agent is asked to relay the tool's JSON untouched, but its transport
//! may hand the payload back quoted, escaped, or as a Python-style byte
//! literal. The entrypoint peels those layers off and always answers with a
//! JSON object.

use super::{tools::SEARCH_TOOL, Agent, AgentResponse};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

/// Unwrapping rounds before giving up on nested string layers.
const MAX_UNWRAP_DEPTH: usize = 4;

/// Anything that can answer a prompt the way [`Agent`] does.
#[async_trait]
pub trait InvocationAgent: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<AgentResponse>;
}

#[async_trait]
impl InvocationAgent for Agent {
    async fn run(&self, prompt: &str) -> Result<AgentResponse> {
        Agent::run(self, prompt).await
    }
}

/// Status code and JSON body of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub status: u16,
    pub body: Value,
}

impl Invocation {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

/// Entrypoint that validates the payload, runs the agent and unwraps its reply.
pub struct Entrypoint<A> {
    agent: A,
}

impl<A: InvocationAgent> Entrypoint<A> {
    pub fn new(agent: A) -> Self {
        Self { agent }
    }

    /// Handle a `{"prompt": ...}` payload.
    pub async fn invoke(&self, payload: &Value) -> Invocation {
        let prompt = match payload.get("prompt").and_then(Value::as_str) {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ => {
                warn!("Invocation without a prompt");
                return Invocation {
                    status: 400,
                    body: json!({ "output": { "error": "No prompt provided" } }),
                };
            }
        };

        info!("Invoking agent");
        let response = match self.agent.run(prompt).await {
            Ok(response) => response,
            Err(e) => {
                error!("Agent failed: {}", e);
                return Invocation {
                    status: 500,
                    body: json!({ "output": { "message": format!("Exception: {}", e) } }),
                };
            }
        };

        match unwrap_agent_output(&response.content) {
            Ok(body) => Invocation::ok(body),
            Err(detail) => {
                debug!("Failed to parse agent reply as JSON: {}", detail);
                match response
                    .last_tool_result(SEARCH_TOOL)
                    .and_then(|raw| unwrap_agent_output(raw).ok())
                {
                    Some(body) => {
                        info!("Using the last tool result instead of the agent reply");
                        Invocation::ok(body)
                    }
                    None => Invocation::ok(json!({
                        "output": { "message": format!("JSONDecodeError: {}", detail) }
                    })),
                }
            }
        }
    }
}

/// Recover the JSON value from an agent reply.
///
/// Each round trims the text, drops a `b'...'` wrapper and tries to parse it
/// as-is, un-escaped, and without surrounding quotes. A parse that yields a
/// JSON string starts another round on that string. As a last resort the
/// outermost `{...}` span is parsed.
pub fn unwrap_agent_output(raw: &str) -> std::result::Result<Value, String> {
    let mut current = raw.to_string();
    let mut last_error = String::from("empty reply");

    for _ in 0..MAX_UNWRAP_DEPTH {
        let layer = strip_byte_literal(current.trim());
        match parse_layer(layer) {
            Ok(Value::String(inner)) => current = inner,
            Ok(value) => return Ok(value),
            Err(e) => {
                last_error = e;
                break;
            }
        }
    }

    match extract_object(&current) {
        Some(value) => Ok(value),
        None => Err(last_error),
    }
}

fn parse_layer(text: &str) -> std::result::Result<Value, String> {
    let first_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e.to_string(),
    };

    let unquoted = text.trim_matches(|c| c == '"' || c == '\'');
    for candidate in [unescape(text), unquoted.to_string(), unescape(unquoted)] {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Ok(value);
        }
    }

    Err(first_error)
}

fn strip_byte_literal(text: &str) -> &str {
    text.strip_prefix("b'")
        .and_then(|rest| rest.strip_suffix('\''))
        .or_else(|| {
            text.strip_prefix("b\"")
                .and_then(|rest| rest.strip_suffix('"'))
        })
        .unwrap_or(text)
}

fn unescape(text: &str) -> String {
    text.replace("\\\"", "\"").replace("\\\\", "\\")
}

fn extract_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let span = &text[start..=end];
    serde_json::from_str::<Value>(span)
        .or_else(|_| serde_json::from_str::<Value>(&unescape(span)))
        .ok()
        .filter(Value::is_object)
}
