use crate::llm_backend::{GenerationConfig, LlmBackend, Message};
use crate::token_tracker::TokenTracker;
use codegraph_core::{CodeGraphError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

const SUMMARY_SYSTEM_INSTRUCTION: &str = "You are given the full contents of a codebase in a single \
digest. Produce: (1) a Markdown architectural summary of the codebase, and (2) a JSON array, in a \
fenced ```json code block, of the form [{\"filename\": string, \"components\": [{\"name\": string, \
\"kind\": string}]}] enumerating every file and the top-level components it defines.";

const DESCRIPTION_SYSTEM_INSTRUCTION: &str = "You are given the content of one file and the name and \
kind of one component defined in it. Write a concise, accurate description of what that component does.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestComponent {
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestFileEntry {
    pub filename: String,
    pub components: Vec<DigestComponent>,
}

#[derive(Debug, Clone)]
pub struct DigestResult {
    pub summary: String,
    pub entries: Vec<DigestFileEntry>,
    /// Set when the component list couldn't be extracted or parsed; `entries` is empty in
    /// that case rather than the run failing outright.
    pub diagnostic: Option<String>,
}

/// Mode B, stage one: send the whole-codebase digest once and extract the architectural
/// summary plus the per-file component inventory (§4.5).
pub async fn summarize_digest(
    backend: &dyn LlmBackend,
    digest: &str,
    tracker: &TokenTracker,
) -> Result<DigestResult> {
    let messages = vec![
        Message::system(SUMMARY_SYSTEM_INSTRUCTION),
        Message::user(digest),
    ];
    let response = backend
        .generate_chat(&messages, &[], &GenerationConfig::default())
        .await?;
    tracker.record(response.input_tokens, response.output_tokens);

    let (entries, diagnostic) = match extract_json_block(&response.content) {
        Some(block) => match serde_json::from_str::<Vec<DigestFileEntry>>(&block) {
            Ok(entries) => (entries, None),
            Err(e) => (Vec::new(), Some(format!("failed to parse component json block: {e}"))),
        },
        None => (Vec::new(), Some("no json code block found in digest summary response".to_string())),
    };

    Ok(DigestResult {
        summary: response.content,
        entries,
        diagnostic,
    })
}

/// Matches the first ` ```json ... ``` ` fenced block in `text`.
fn extract_json_block(text: &str) -> Option<String> {
    let re = Regex::new(r"(?s)```json\s*\n(.*?)```").expect("static regex is valid");
    re.captures(text).map(|caps| caps[1].trim().to_string())
}

/// Mode B, stage two: describe one previously-discovered component, given the content of
/// the file that contains it.
pub async fn describe_component(
    backend: &dyn LlmBackend,
    file_content: &str,
    component: &DigestComponent,
    tracker: &TokenTracker,
) -> Result<String> {
    let prompt = format!(
        "File content:\n{file_content}\n\nComponent: {} (kind: {})",
        component.name, component.kind
    );
    let messages = vec![
        Message::system(DESCRIPTION_SYSTEM_INSTRUCTION),
        Message::user(prompt),
    ];
    let response = backend
        .generate_chat(&messages, &[], &GenerationConfig::default())
        .await
        .map_err(|e| CodeGraphError::Extraction(format!("describe_component failed: {e}")))?;
    tracker.record(response.input_tokens, response.output_tokens);
    Ok(response.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_backend::{LlmResponse, ToolDefinition};
    use async_trait::async_trait;

    struct StubBackend {
        content: String,
    }

    #[async_trait]
    impl LlmBackend for StubBackend {
        async fn generate_chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _config: &GenerationConfig,
        ) -> Result<LlmResponse> {
            Ok(LlmResponse {
                content: self.content.clone(),
                tool_calls: vec![],
                input_tokens: 100,
                output_tokens: 50,
            })
        }
    }

    #[tokio::test]
    async fn extracts_components_from_fenced_json_block() {
        let backend = StubBackend {
            content: "## Summary\nsome text\n```json\n[{\"filename\": \"a.ts\", \"components\": \
                      [{\"name\": \"Foo\", \"kind\": \"class\"}]}]\n```\nmore text"
                .to_string(),
        };
        let tracker = TokenTracker::new();
        let result = summarize_digest(&backend, "digest text", &tracker).await.unwrap();
        assert!(result.diagnostic.is_none());
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].components[0].name, "Foo");
    }

    #[tokio::test]
    async fn missing_json_block_yields_empty_entries_and_a_diagnostic() {
        let backend = StubBackend {
            content: "just prose, no code block here".to_string(),
        };
        let tracker = TokenTracker::new();
        let result = summarize_digest(&backend, "digest text", &tracker).await.unwrap();
        assert!(result.entries.is_empty());
        assert!(result.diagnostic.is_some());
    }

    #[tokio::test]
    async fn malformed_json_block_yields_empty_entries_and_a_diagnostic() {
        let backend = StubBackend {
            content: "```json\n{not valid json\n```".to_string(),
        };
        let tracker = TokenTracker::new();
        let result = summarize_digest(&backend, "digest text", &tracker).await.unwrap();
        assert!(result.entries.is_empty());
        assert!(result.diagnostic.is_some());
    }

    #[tokio::test]
    async fn describe_component_records_token_usage() {
        let backend = StubBackend {
            content: "does a thing".to_string(),
        };
        let tracker = TokenTracker::new();
        let component = DigestComponent {
            name: "Foo".to_string(),
            kind: "class".to_string(),
        };
        let description = describe_component(&backend, "class Foo {}", &component, &tracker)
            .await
            .unwrap();
        assert_eq!(description, "does a thing");
        assert_eq!(tracker.usage().total_tokens, 150);
    }
}
