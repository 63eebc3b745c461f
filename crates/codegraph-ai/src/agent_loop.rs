use crate::llm_backend::{GenerationConfig, LlmBackend, Message};
use crate::token_tracker::TokenTracker;
use crate::tools::{
    tool_definitions, CreateIndexEntryArgs, GetSymbolDetailsArgs, ListFilesystemArgs, ListSymbolsInFileArgs,
    ReadFileArgs, ToolExecutor,
};
use codegraph_core::{CodeGraphError, Result};

#[derive(Debug, Clone, Copy)]
pub struct AgentLoopConfig {
    pub max_iterations: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self { max_iterations: 20 }
    }
}

const SYSTEM_INSTRUCTION: &str = "You are exploring a source tree to build a semantic index. \
Use the provided tools to list files, read their contents, enumerate symbols, inspect a \
symbol's span and content, and record a synthesized description for each symbol worth \
indexing with create_index_entry. Be thorough but avoid revisiting files you've already \
fully indexed.";

/// Mode A: a single bounded conversation where the model drives exploration via tool calls
/// (§4.5). Returns the model's final (non-tool-call) text, or a diagnostic if the loop
/// exhausts `max_iterations` without one.
pub async fn run_agent_loop(
    backend: &dyn LlmBackend,
    executor: &dyn ToolExecutor,
    goal: &str,
    config: AgentLoopConfig,
    tracker: &TokenTracker,
) -> Result<String> {
    let tools = tool_definitions();
    let mut messages = vec![Message::system(SYSTEM_INSTRUCTION), Message::user(goal)];

    for _ in 0..config.max_iterations {
        let response = backend
            .generate_chat(&messages, &tools, &GenerationConfig::default())
            .await?;
        tracker.record(response.input_tokens, response.output_tokens);

        if !response.has_tool_calls() {
            return Ok(response.content);
        }

        messages.push(Message::assistant(response.content.clone()));

        let mut results = String::new();
        for call in &response.tool_calls {
            let outcome = execute_tool(executor, &call.name, &call.arguments).await;
            let rendered = match outcome {
                Ok(value) => format!("Function {} result: {value}\n", call.name),
                Err(e) => format!("Function {} result: {{\"error\": \"{e}\"}}\n", call.name),
            };
            results.push_str(&rendered);
        }
        results.push_str("\nBased on these results, please continue your exploration.");
        messages.push(Message::user(results));
    }

    Ok("exploration stopped after reaching the iteration limit".to_string())
}

async fn execute_tool(executor: &dyn ToolExecutor, name: &str, arguments: &str) -> Result<serde_json::Value> {
    let malformed = |e: serde_json::Error| CodeGraphError::MalformedToolCall(format!("{name}: {e}"));

    match name {
        "list_filesystem" => {
            let args: ListFilesystemArgs = serde_json::from_str(arguments).map_err(malformed)?;
            executor.list_filesystem(args).await
        }
        "read_file" => {
            let args: ReadFileArgs = serde_json::from_str(arguments).map_err(malformed)?;
            executor.read_file(args).await
        }
        "list_symbols_in_file" => {
            let args: ListSymbolsInFileArgs = serde_json::from_str(arguments).map_err(malformed)?;
            executor.list_symbols_in_file(args).await
        }
        "get_symbol_details" => {
            let args: GetSymbolDetailsArgs = serde_json::from_str(arguments).map_err(malformed)?;
            executor.get_symbol_details(args).await
        }
        "create_index_entry" => {
            let args: CreateIndexEntryArgs = serde_json::from_str(arguments).map_err(malformed)?;
            executor.create_index_entry(args).await
        }
        other => Err(CodeGraphError::MalformedToolCall(format!("unknown tool: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_backend::{LlmResponse, ToolCall};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        turn: AtomicUsize,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn generate_chat(
            &self,
            _messages: &[Message],
            _tools: &[crate::llm_backend::ToolDefinition],
            _config: &GenerationConfig,
        ) -> Result<LlmResponse> {
            let turn = self.turn.fetch_add(1, Ordering::SeqCst);
            if turn == 0 {
                Ok(LlmResponse {
                    content: String::new(),
                    tool_calls: vec![ToolCall {
                        id: "1".to_string(),
                        name: "list_filesystem".to_string(),
                        arguments: json!({ "path": "." }).to_string(),
                    }],
                    input_tokens: 10,
                    output_tokens: 5,
                })
            } else {
                Ok(LlmResponse {
                    content: "done exploring".to_string(),
                    tool_calls: vec![],
                    input_tokens: 8,
                    output_tokens: 4,
                })
            }
        }
    }

    struct StubExecutor;

    #[async_trait]
    impl ToolExecutor for StubExecutor {
        async fn list_filesystem(&self, _args: ListFilesystemArgs) -> Result<serde_json::Value> {
            Ok(json!(["src/a.ts"]))
        }
        async fn read_file(&self, _args: ReadFileArgs) -> Result<serde_json::Value> {
            Ok(json!("content"))
        }
        async fn list_symbols_in_file(&self, _args: ListSymbolsInFileArgs) -> Result<serde_json::Value> {
            Ok(json!([]))
        }
        async fn get_symbol_details(&self, _args: GetSymbolDetailsArgs) -> Result<serde_json::Value> {
            Ok(json!({}))
        }
        async fn create_index_entry(&self, _args: CreateIndexEntryArgs) -> Result<serde_json::Value> {
            Ok(json!({"ok": true}))
        }
    }

    #[tokio::test]
    async fn loop_finishes_once_the_model_stops_calling_tools() {
        let backend = ScriptedBackend { turn: AtomicUsize::new(0) };
        let executor = StubExecutor;
        let tracker = TokenTracker::new();
        let result = run_agent_loop(&backend, &executor, "index this repo", AgentLoopConfig::default(), &tracker)
            .await
            .unwrap();
        assert_eq!(result, "done exploring");
        assert_eq!(tracker.usage().total_tokens, 27);
    }

    #[tokio::test]
    async fn unknown_tool_name_is_reported_to_the_model_not_propagated() {
        let executor = StubExecutor;
        let result = execute_tool(&executor, "delete_everything", "{}").await;
        assert!(matches!(result, Err(CodeGraphError::MalformedToolCall(_))));
    }
}
