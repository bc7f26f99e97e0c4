//! Tool-calling agent in front of the search pipeline.
//!
//! The agent exposes a single `search_transcripts` tool and is prompted to
//! hand the tool's JSON back unchanged. The entrypoint validates incoming
//! payloads and recovers that JSON from whatever the model returns.

mod entrypoint;
mod runner;
mod tools;

pub use entrypoint::{unwrap_agent_output, Entrypoint, Invocation, InvocationAgent};
pub use runner::{Agent, AgentResponse, ToolCallRecord};
pub use tools::{parse_tool_call, tool_definitions, ToolCall, ToolContext, SEARCH_TOOL};
