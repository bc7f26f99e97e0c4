//! The `search_transcripts` tool exposed to the agent.

use crate::error::{Result, VidseekError};
use crate::retrieval::SearchPipeline;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the transcript search tool.
pub const SEARCH_TOOL: &str = "search_transcripts";

/// Tools the agent can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// Hybrid search over the transcript index.
    SearchTranscripts { query: String },
}

/// Tool execution context.
pub struct ToolContext {
    pub pipeline: Arc<SearchPipeline>,
}

impl ToolContext {
    pub fn new(pipeline: Arc<SearchPipeline>) -> Self {
        Self { pipeline }
    }

    /// Execute a tool call. The result is the JSON envelope as a string.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        match tool {
            ToolCall::SearchTranscripts { query } => {
                Ok(self.pipeline.run_tool(query).await.to_json_string())
            }
        }
    }
}

/// Tool definitions advertised to the model.
pub fn tool_definitions() -> Vec<ChatCompletionTool> {
    vec![ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: SEARCH_TOOL.to_string(),
            description: Some(
                "Search video transcripts with hybrid semantic and keyword ranking. \
                Returns the two most relevant videos with their links and a recommendation, \
                as a JSON object under \"output\"."
                    .to_string(),
            ),
            parameters: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The user's question or topic"
                    }
                },
                "required": ["query"]
            })),
            strict: None,
        },
    }]
}

/// Parse a tool call from the OpenAI response format.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| VidseekError::Agent(format!("Invalid tool arguments: {}", e)))?;

    match name {
        SEARCH_TOOL => {
            let query = args["query"]
                .as_str()
                .ok_or_else(|| VidseekError::Agent("Missing 'query' argument".to_string()))?
                .to_string();
            Ok(ToolCall::SearchTranscripts { query })
        }
        _ => Err(VidseekError::Agent(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_tool() {
        let tool = parse_tool_call(SEARCH_TOOL, r#"{"query": "CISO guidance"}"#).unwrap();
        assert_eq!(
            tool,
            ToolCall::SearchTranscripts {
                query: "CISO guidance".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_calls() {
        assert!(parse_tool_call(SEARCH_TOOL, "{}").is_err());
        assert!(parse_tool_call(SEARCH_TOOL, "not json").is_err());
        assert!(parse_tool_call("get_transcript", r#"{"query": "x"}"#).is_err());
    }

    #[test]
    fn test_tool_definitions() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, SEARCH_TOOL);
    }
}
